use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::ParseRules;
use crate::formats::{Link, ScrapedRow};

struct CompiledRules {
    row: Selector,
    cell: Selector,
    anchor: Selector,
}

fn compile(rules: &ParseRules) -> anyhow::Result<CompiledRules> {
    Ok(CompiledRules {
        row: parse_selector(&rules.row_selector)?,
        cell: parse_selector(&rules.cell_selector)?,
        anchor: parse_selector("a")?,
    })
}

fn parse_selector(selector: &str) -> anyhow::Result<Selector> {
    Selector::parse(selector)
        .map_err(|err| anyhow::anyhow!("invalid selector {selector:?}: {err}"))
}

/// Fails when a configured selector does not parse.
pub fn validate_rules(rules: &ParseRules) -> anyhow::Result<()> {
    compile(rules).map(|_| ())
}

/// Extracts listing rows from `html`.
///
/// Rows with no cell at all (header rows, spacers) are skipped. Missing
/// cells inside a data row come back as empty links. Hrefs are resolved
/// against `base_url`.
pub fn parse_rows(
    html: &str,
    base_url: &Url,
    rules: &ParseRules,
) -> anyhow::Result<Vec<ScrapedRow>> {
    let compiled = compile(rules)?;
    let document = Html::parse_document(html);

    let mut rows = Vec::new();
    for row in document.select(&compiled.row) {
        let cells: Vec<ElementRef<'_>> = row.select(&compiled.cell).collect();
        if cells.is_empty() {
            continue;
        }

        let link_at = |index: usize| {
            cells
                .get(index)
                .map(|cell| cell_link(cell, &compiled.anchor, base_url))
                .unwrap_or_default()
        };

        let work = link_at(rules.columns.work);
        let chapter = link_at(rules.columns.chapter);
        let translator = link_at(rules.columns.translator);
        let date = link_at(rules.columns.date).text;

        let raw_title = work.text.clone();
        rows.push(ScrapedRow {
            candidates: crate::normalize::normalize(&raw_title),
            raw_title,
            work,
            chapter,
            translator,
            date,
        });
    }

    tracing::debug!(rows = rows.len(), "parsed listing rows");
    Ok(rows)
}

fn cell_link(cell: &ElementRef<'_>, anchor: &Selector, base_url: &Url) -> Link {
    match cell.select(anchor).next() {
        Some(a) => Link {
            text: collapse_text(a),
            href: a
                .value()
                .attr("href")
                .map(str::trim)
                .filter(|href| !href.is_empty())
                .map(|href| resolve_href(base_url, href)),
        },
        None => Link {
            text: collapse_text(*cell),
            href: None,
        },
    }
}

fn collapse_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn resolve_href(base_url: &Url, href: &str) -> String {
    match base_url.join(href) {
        Ok(url) => url.to_string(),
        Err(err) => {
            tracing::debug!(href, ?err, "keeping unresolvable href as-is");
            href.to_owned()
        }
    }
}
