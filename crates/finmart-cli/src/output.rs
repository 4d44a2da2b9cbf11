//! Plain-text tables for terminal output.

use std::fmt::Write as _;

use finmart_core::document::Document;

use crate::client::Application;

/// Render rows as left-aligned columns separated by two spaces.
fn table(header: &[&str], rows: Vec<Vec<String>>) -> String {
  let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
  for row in &rows {
    for (w, cell) in widths.iter_mut().zip(row) {
      *w = (*w).max(cell.chars().count());
    }
  }

  let mut out = String::new();
  let header: Vec<String> = header.iter().map(|h| h.to_string()).collect();
  for row in std::iter::once(header).chain(rows) {
    let line = row
      .iter()
      .zip(&widths)
      .map(|(cell, w)| format!("{cell:<w$}"))
      .collect::<Vec<_>>()
      .join("  ");
    let _ = writeln!(out, "{}", line.trim_end());
  }
  out
}

pub fn applications_table(apps: &[Application]) -> String {
  let rows = apps
    .iter()
    .map(|a| {
      vec![
        a.id.to_string(),
        a.kind.clone(),
        a.display_amount.clone().unwrap_or_else(|| "-".into()),
        a.status.to_string(),
        a.source.clone(),
        a.created_at.format("%Y-%m-%d %H:%M").to_string(),
      ]
    })
    .collect();
  table(&["ID", "TYPE", "AMOUNT", "STATUS", "SOURCE", "CREATED"], rows)
}

pub fn documents_table(docs: &[Document]) -> String {
  let rows = docs
    .iter()
    .map(|d| {
      vec![
        d.id.to_string(),
        d.kind.to_string(),
        d.user_id.clone().unwrap_or_else(|| "-".into()),
        d.status.to_string(),
        d.created_at.format("%Y-%m-%d %H:%M").to_string(),
      ]
    })
    .collect();
  table(&["ID", "TYPE", "USER", "STATUS", "CREATED"], rows)
}
