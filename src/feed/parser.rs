// src/feed/parser.rs
//! Namespace-aware parser for the PLACSP Atom feed.
//!
//! Domain fields live inside a CODICE/UBL `ContractFolderStatus` extension
//! embedded per `<entry>`. Namespace prefixes (`cac:`, `cbc:`,
//! `cac-place-ext:`, ...) vary between deployments, so matching is done on
//! local element names with path context, never on prefixes.
//!
//! Fault model: a document that is not well-formed XML yields
//! [`FeedError::Parse`] and zero entries; an entry missing its required
//! fields is skipped and counted without aborting the batch.

use chrono::NaiveDate;
use once_cell::sync::OnceCell;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::error::FeedError;
use crate::feed::types::{FeedEntry, Winner};

/// Entries that survived parsing plus the count of entries that did not.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub entries: Vec<FeedEntry>,
    pub skipped: usize,
}

/// Parse the raw feed bytes into normalized entries.
pub fn parse(raw: &[u8]) -> Result<ParseOutcome, FeedError> {
    let text = String::from_utf8_lossy(raw);
    let mut reader = Reader::from_str(&text);
    reader.config_mut().trim_text(true);

    let mut out = ParseOutcome::default();
    let mut path: Vec<String> = Vec::new();
    let mut draft: Option<EntryDraft> = None;

    loop {
        match reader.read_event() {
            Err(e) => return Err(FeedError::Parse(e.to_string())),
            Ok(Event::Eof) => break,
            Ok(Event::Start(start)) => {
                let local = local_name(&start);
                if local == "entry" {
                    draft = Some(EntryDraft::default());
                }
                path.push(local.clone());
                if let Some(d) = draft.as_mut() {
                    d.on_element(&local, &start, &path);
                }
            }
            Ok(Event::Empty(start)) => {
                // Self-closing elements (typically <link .../>) never carry
                // text, only attributes.
                let local = local_name(&start);
                if let Some(d) = draft.as_mut() {
                    path.push(local.clone());
                    d.on_element(&local, &start, &path);
                    path.pop();
                }
            }
            Ok(Event::Text(t)) => {
                let value = match t.unescape() {
                    Ok(v) => v.into_owned(),
                    Err(e) => return Err(FeedError::Parse(e.to_string())),
                };
                if let Some(d) = draft.as_mut() {
                    d.on_text(&path, &value);
                }
            }
            Ok(Event::End(end)) => {
                let closed_entry = end.local_name().as_ref() == b"entry";
                path.pop();
                if closed_entry {
                    match draft.take().map(EntryDraft::finish) {
                        Some(Ok(entry)) => out.entries.push(entry),
                        Some(Err(reason)) => {
                            debug!(reason, "skipping malformed feed entry");
                            out.skipped += 1;
                        }
                        None => {}
                    }
                }
            }
            Ok(_) => {}
        }
    }

    Ok(out)
}

/// Business-key extraction from an opaque entry identifier: the `idDoc`
/// query parameter when present, otherwise the last path segment.
pub fn extract_business_key(raw: &str) -> String {
    if let Some(pos) = raw.find("idDoc=") {
        let tail = &raw[pos + "idDoc=".len()..];
        let end = tail.find('&').unwrap_or(tail.len());
        if end > 0 {
            return tail[..end].to_string();
        }
    }
    let no_query = raw.split(['?', '#']).next().unwrap_or(raw);
    no_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(no_query)
        .to_string()
}

fn local_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.name().local_name().as_ref()).into_owned()
}

/// Collapse whitespace, decode residual HTML entities, strip tags, cap length.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > 4000 {
        out = out.chars().take(4000).collect();
    }
    out
}

#[derive(Debug, Default)]
struct EntryDraft {
    id_raw: String,
    folder_id: String,
    title: String,
    project_name: String,
    description: String,
    cpv_code: String,
    cpv_description: String,
    amount: Option<f64>,
    contracting_body: String,
    status_code: String,
    deadline: Option<NaiveDate>,
    detail_url: String,
    document_url: String,
    winner_name: String,
    winner_tax_id: Option<String>,
}

impl EntryDraft {
    /// Attribute-carrying elements: links and the CPV classification code.
    fn on_element(&mut self, local: &str, start: &BytesStart<'_>, path: &[String]) {
        match local {
            "link" if directly_under_entry(path) => {
                let mut href = String::new();
                let mut rel = String::new();
                for attr in start.attributes().flatten() {
                    let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
                    let value = attr.unescape_value().map(|v| v.into_owned()).unwrap_or_default();
                    match key.as_str() {
                        "href" => href = value,
                        "rel" => rel = value,
                        _ => {}
                    }
                }
                if href.is_empty() {
                    return;
                }
                if (rel.is_empty() || rel == "alternate") && self.detail_url.is_empty() {
                    self.detail_url = href;
                } else if self.document_url.is_empty() {
                    self.document_url = href;
                }
            }
            "ItemClassificationCode" => {
                for attr in start.attributes().flatten() {
                    if attr.key.local_name().as_ref() == b"name" && self.cpv_description.is_empty() {
                        self.cpv_description =
                            attr.unescape_value().map(|v| v.into_owned()).unwrap_or_default();
                    }
                }
            }
            _ => {}
        }
    }

    fn on_text(&mut self, path: &[String], value: &str) {
        let Some(current) = path.last().map(String::as_str) else {
            return;
        };
        match current {
            "id" if directly_under_entry(path) => self.id_raw = value.trim().to_string(),
            "title" if directly_under_entry(path) => self.title = normalize_text(value),
            "summary" if directly_under_entry(path) => self.description = normalize_text(value),
            "ContractFolderID" => self.folder_id = value.trim().to_string(),
            "ContractFolderStatusCode" => self.status_code = value.trim().to_string(),
            "ItemClassificationCode" => {
                // First classification wins; secondary CPVs are ignored.
                if self.cpv_code.is_empty() {
                    self.cpv_code = value.trim().to_string();
                }
            }
            "TotalAmount" | "EstimatedOverallContractAmount" if within(path, "BudgetAmount") => {
                if self.amount.is_none() {
                    self.amount = value.trim().parse::<f64>().ok();
                }
            }
            "EndDate" if within(path, "TenderSubmissionDeadlinePeriod") => {
                if self.deadline.is_none() {
                    self.deadline = parse_date(value);
                }
            }
            "Name" if within(path, "LocatedContractingParty") && within(path, "PartyName") => {
                if self.contracting_body.is_empty() {
                    self.contracting_body = normalize_text(value);
                }
            }
            "Name" if within(path, "WinningParty") && within(path, "PartyName") => {
                if self.winner_name.is_empty() {
                    self.winner_name = normalize_text(value);
                }
            }
            "ID" if within(path, "WinningParty") && within(path, "PartyIdentification") => {
                let v = value.trim();
                if self.winner_tax_id.is_none() && !v.is_empty() {
                    self.winner_tax_id = Some(v.to_string());
                }
            }
            "Name" if within(path, "ProcurementProject") => {
                if self.project_name.is_empty() {
                    self.project_name = normalize_text(value);
                }
            }
            _ => {}
        }
    }

    fn finish(self) -> Result<FeedEntry, &'static str> {
        let key_source = if !self.id_raw.is_empty() {
            self.id_raw.as_str()
        } else if !self.folder_id.is_empty() {
            self.folder_id.as_str()
        } else {
            return Err("entry carries no identifier");
        };
        if self.status_code.is_empty() {
            return Err("entry carries no status code");
        }

        let business_key = extract_business_key(key_source);
        let title = if !self.title.is_empty() {
            self.title.clone()
        } else {
            self.project_name.clone()
        };
        if title.is_empty() {
            return Err("entry carries no title");
        }

        let document_url = if !self.document_url.is_empty() {
            self.document_url.clone()
        } else {
            self.detail_url.clone()
        };
        let winner = if self.winner_name.is_empty() {
            None
        } else {
            Some(Winner {
                name: self.winner_name,
                tax_id: self.winner_tax_id,
            })
        };

        Ok(FeedEntry {
            business_key,
            title,
            description: self.description,
            cpv_code: self.cpv_code,
            cpv_description: self.cpv_description,
            amount: self.amount,
            contracting_body: self.contracting_body,
            status_code: self.status_code,
            deadline: self.deadline,
            detail_url: self.detail_url,
            document_url,
            winner,
        })
    }
}

fn directly_under_entry(path: &[String]) -> bool {
    path.len() >= 2 && path[path.len() - 2] == "entry"
}

fn within(path: &[String], ancestor: &str) -> bool {
    path.iter().any(|p| p == ancestor)
}

/// Deadlines arrive as `YYYY-MM-DD`, sometimes with a time or offset suffix.
/// The 10-byte prefix is only taken when it falls on a char boundary; text
/// with multi-byte characters there cannot be a date anyway.
fn parse_date(value: &str) -> Option<NaiveDate> {
    let v = value.trim();
    let date_part = v.get(..10).unwrap_or(v);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}
