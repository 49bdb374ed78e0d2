// src/ingest/providers/rss.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::Client;

use crate::ingest::config::SourceCfg;
use crate::ingest::error::IngestError;
use crate::ingest::http::{get_text, render_target};
use crate::ingest::types::{CanonicalRecord, SourceAdapter};
use crate::ingest::{normalize_text, parse_published};

/// Fields shared by both feed dialects before normalization.
#[derive(Debug, Default)]
struct RawEntry {
    title: Option<String>,
    link: Option<String>,
    // Atom `<link href rel>` candidates, in document order.
    links: Vec<(Option<String>, String)>,
    published: Option<String>,
    updated: Option<String>,
    description: Option<String>,
    content: Option<String>,
    author: Option<String>,
    source_name: Option<String>,
}

impl RawEntry {
    /// RSS text link first, else Atom rel="alternate" (or no rel), else the first href.
    fn best_link(&self) -> Option<&str> {
        self.link.as_deref().filter(|l| !l.trim().is_empty()).or_else(|| {
            self.links
                .iter()
                .find(|(rel, _)| matches!(rel.as_deref(), None | Some("alternate")))
                .or_else(|| self.links.first())
                .map(|(_, href)| href.as_str())
        })
    }
}

fn set_once(slot: &mut Option<String>, text: &str) {
    if slot.is_none() && !text.trim().is_empty() {
        *slot = Some(text.to_string());
    }
}

/// Generic keyword-search feed: one instance per configured platform.
pub struct RssAdapter {
    platform: String,
    template: String,
    class: String,
    client: Client,
}

impl RssAdapter {
    pub fn new(cfg: &SourceCfg, client: Client) -> Self {
        // Throttle by host so platforms fronted by the same endpoint share spacing.
        let class = reqwest::Url::parse(&cfg.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| cfg.name.clone());
        Self {
            platform: cfg.name.clone(),
            template: cfg.url.clone(),
            class,
            client,
        }
    }

    pub fn target_for(&self, keyword: &str) -> String {
        render_target(&self.template, keyword)
    }
}

#[async_trait]
impl SourceAdapter for RssAdapter {
    async fn fetch(&self, keyword: &str) -> Result<Vec<CanonicalRecord>, IngestError> {
        let url = self.target_for(keyword);
        tracing::debug!(target: "ingest", platform = %self.platform, %url, "fetching feed");
        let body = get_text(&self.client, &self.platform, &url).await?;
        parse_feed(&self.platform, keyword, &body, Utc::now())
    }

    fn platform(&self) -> &str {
        &self.platform
    }

    fn source_class(&self) -> &str {
        &self.class
    }
}

/// Parse an RSS 2.0 or Atom document into canonical records.
/// Entries without a title or link are dropped; a bad date falls back to `now`.
pub fn parse_feed(
    platform: &str,
    keyword: &str,
    body: &str,
    now: DateTime<Utc>,
) -> Result<Vec<CanonicalRecord>, IngestError> {
    let t0 = std::time::Instant::now();
    let (feed_title, entries) = scan_feed(body).map_err(|e| IngestError::parse(platform, e))?;

    let feed_title = feed_title
        .map(|t| normalize_text(&t))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| platform.to_string());

    let mut out = Vec::with_capacity(entries.len());
    let mut skipped = 0usize;
    for e in entries {
        let title = normalize_text(e.title.as_deref().unwrap_or_default());
        let url = e.best_link().map(str::trim).unwrap_or_default().to_string();
        if title.is_empty() || url.is_empty() {
            skipped += 1;
            continue;
        }
        let source_name = e
            .source_name
            .map(|s| normalize_text(&s))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| feed_title.clone());

        out.push(CanonicalRecord {
            title,
            description: normalize_text(e.description.or(e.content).as_deref().unwrap_or_default()),
            url,
            source_name,
            platform: platform.to_string(),
            keyword: keyword.to_string(),
            published_at: parse_published(e.published.or(e.updated).as_deref(), now),
            author: normalize_text(e.author.as_deref().unwrap_or_default()),
        });
    }

    if skipped > 0 {
        tracing::debug!(target: "ingest", platform, skipped, "dropped feed entries without title/link");
    }

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("ingest_parse_ms").record(ms);
    counter!("ingest_records_fetched_total").increment(out.len() as u64);
    Ok(out)
}

/// Pull-parse an RSS 2.0 / RSS 1.0 / Atom document into its title and raw entries.
///
/// Element names are matched with their prefix, so extension elements such as
/// `media:title` never shadow the core fields. Unknown elements are ignored
/// wherever they appear.
fn scan_feed(xml: &str) -> Result<(Option<String>, Vec<RawEntry>), String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut feed_title: Option<String> = None;
    let mut entries = Vec::new();
    let mut current: Option<RawEntry> = None;
    // Stack depth of the open <item>/<entry> element.
    let mut entry_depth = 0usize;
    let mut saw_root = false;

    loop {
        let ev = reader
            .read_event()
            .map_err(|e| format!("{e} at byte {}", reader.buffer_position()))?;
        match ev {
            Event::Start(e) => {
                let name = qname(&e);
                if stack.is_empty() {
                    saw_root = is_feed_root(&name);
                    if !saw_root {
                        return Err(format!("unexpected root element <{name}>"));
                    }
                }
                if current.is_none() && (name == "item" || name == "entry") {
                    current = Some(RawEntry::default());
                    entry_depth = stack.len() + 1;
                } else if let Some(entry) = current.as_mut() {
                    if name == "link" && stack.len() == entry_depth {
                        push_atom_link(entry, &e);
                    }
                }
                stack.push(name);
                text.clear();
            }
            Event::Empty(e) => {
                if let Some(entry) = current.as_mut() {
                    if qname(&e) == "link" && stack.len() == entry_depth {
                        push_atom_link(entry, &e);
                    }
                }
            }
            Event::Text(t) => {
                // Unknown HTML entities are left for `normalize_text` to decode.
                match t.unescape() {
                    Ok(s) => text.push_str(&s),
                    Err(_) => text.push_str(&String::from_utf8_lossy(&t)),
                }
            }
            Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c)),
            Event::End(_) => {
                let Some(name) = stack.pop() else {
                    return Err("unbalanced end tag".to_string());
                };
                let value = std::mem::take(&mut text);
                let parent = stack.last().map(String::as_str);

                if current.is_some() && stack.len() + 1 == entry_depth {
                    entries.extend(current.take());
                } else if let Some(entry) = current.as_mut() {
                    if stack.len() == entry_depth {
                        assign_entry_field(entry, &name, &value);
                    } else if name == "name"
                        && parent == Some("author")
                        && stack.len() == entry_depth + 1
                    {
                        // Atom <author><name>..</name></author>
                        set_once(&mut entry.author, &value);
                    }
                } else if name == "title" && matches!(parent, Some("channel" | "feed")) {
                    set_once(&mut feed_title, &value);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err("no RSS or Atom root element".to_string());
    }
    if !stack.is_empty() {
        return Err(format!("document truncated inside <{}>", stack.join("/")));
    }
    Ok((feed_title, entries))
}

fn qname(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn is_feed_root(name: &str) -> bool {
    matches!(name, "rss" | "feed" | "rdf:RDF")
}

fn assign_entry_field(entry: &mut RawEntry, name: &str, value: &str) {
    match name {
        "title" => set_once(&mut entry.title, value),
        "link" => set_once(&mut entry.link, value),
        "pubDate" | "published" | "dc:date" => set_once(&mut entry.published, value),
        "updated" => set_once(&mut entry.updated, value),
        "description" | "summary" => set_once(&mut entry.description, value),
        "content" | "content:encoded" => set_once(&mut entry.content, value),
        "author" | "dc:creator" => set_once(&mut entry.author, value),
        // Aggregators (Google News) name the real publisher per item.
        "source" => set_once(&mut entry.source_name, value),
        _ => {}
    }
}

fn push_atom_link(entry: &mut RawEntry, e: &BytesStart<'_>) {
    let attr = |key: &str| {
        e.try_get_attribute(key)
            .ok()
            .flatten()
            .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
    };
    if let Some(href) = attr("href").filter(|h| !h.trim().is_empty()) {
        entry.links.push((attr("rel"), href));
    }
}
