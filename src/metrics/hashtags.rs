use anyhow::Result;
use std::collections::HashMap;

use super::column;
use crate::table::{Column, Table, Value};

/// Whitespace-separated tokens starting with `#`, lower-cased, marker
/// stripped. A bare `#` is dropped.
pub fn extract_hashtags(text: &str) -> Vec<String> {
    text.split_whitespace()
        .filter(|tok| tok.starts_with('#'))
        .map(|tok| tok.trim_matches('#').to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// The `n` most frequent hashtags across `texts`, count descending. Equal
/// counts keep the order in which the tags were first seen.
pub fn top_hashtags<'a, I>(texts: I, n: usize) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut order: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for text in texts {
        for tag in extract_hashtags(text) {
            match index.get(&tag) {
                Some(&i) => order[i].1 += 1,
                None => {
                    index.insert(tag.clone(), order.len());
                    order.push((tag, 1));
                }
            }
        }
    }

    order.sort_by(|a, b| b.1.cmp(&a.1));
    order.truncate(n);
    order
}

/// `(hashtag, count)` table over the text column `text_col`.
pub fn hashtag_table(table: &Table, text_col: &str, n: usize) -> Result<Table> {
    let texts = column(table, text_col)?.values.iter().filter_map(Value::as_str);
    let (tags, counts): (Vec<Value>, Vec<Value>) = top_hashtags(texts, n)
        .into_iter()
        .map(|(tag, count)| (Value::Text(tag), Value::Number(count as f64)))
        .unzip();
    Table::new(
        "top_hashtags",
        vec![Column::new("hashtag", tags), Column::new("count", counts)],
    )
}
