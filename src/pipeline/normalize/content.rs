//! Synthetic content-type table: one row per follows date per configured
//! content type, with reach drawn from a fixed cycle.

use crate::config::ContentModel;
use crate::table::{Table, Value};

pub const COLUMNS: &[&str] = &["date", "content_type", "published", "interactions", "reach"];

pub fn derive_content(follows: &Table, model: &ContentModel) -> Table {
    let mut out = Table::empty(COLUMNS);
    if model.content_types.is_empty() || model.reach_cycle.is_empty() {
        return out;
    }
    let date_idx = follows.column_index("date");
    for row in &follows.rows {
        let date = date_idx.map(|i| row[i].clone()).unwrap_or(Value::Null);
        for (i, ctype) in model.content_types.iter().enumerate() {
            let reach = model.reach_cycle[i % model.reach_cycle.len()];
            out.push_row(vec![
                date.clone(),
                Value::Str(ctype.clone()),
                Value::Int(1),
                Value::Int(1),
                Value::Int(reach),
            ]);
        }
    }
    out
}
