//! Streaming parser for XMLTV guide documents
//!
//! Built on quick-xml events so multi-megabyte guides never need a DOM.
//! Programmes may sit at the document root or be nested inside a `channel`
//! element; both are flattened into one record sequence, and the channel
//! catalog is collected alongside. Each field is filled by explicit tag-name
//! dispatch, never by tag order.

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::io::BufRead;

use crate::xmltv::time::parse_xmltv;

/// Episode number as carried on the wire, e.g. system "xmltv_ns", value "0.4.".
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeNum {
    pub value: String,
    pub system: String,
}

/// One broadcast instance from a guide document.
///
/// `start`/`stop` are `None` when the attribute was missing or unparseable;
/// such records survive the parse and are excluded by the filter instead.
/// The raw attribute strings are kept so output can echo them verbatim.
#[derive(Debug, Clone)]
pub struct Programme {
    pub channel: String,
    pub start: Option<DateTime<Utc>>,
    pub stop: Option<DateTime<Utc>>,
    pub start_raw: String,
    pub stop_raw: String,
    pub title: String,
    pub sub_title: String,
    pub desc: String,
    pub category: String,
    pub icon: Option<String>,
    pub episode_num: Option<EpisodeNum>,
}

impl Programme {
    fn from_attributes(e: &BytesStart) -> Self {
        let start_raw = attr(e, b"start").unwrap_or_default();
        let stop_raw = attr(e, b"stop").unwrap_or_default();
        Programme {
            channel: attr(e, b"channel").unwrap_or_default(),
            start: parse_xmltv(&start_raw),
            stop: parse_xmltv(&stop_raw),
            start_raw,
            stop_raw,
            title: String::new(),
            sub_title: String::new(),
            desc: String::new(),
            category: String::new(),
            icon: None,
            episode_num: None,
        }
    }
}

/// One `channel` element from the catalog section of a guide.
#[derive(Debug, Clone)]
pub struct Channel {
    pub id: String,
    pub display_name: String,
    pub icon: Option<String>,
}

/// Result of one source parse.
#[derive(Debug, Clone, Default)]
pub struct ParsedGuide {
    pub channels: Vec<Channel>,
    pub programmes: Vec<Programme>,
    /// Count of malformed XML events that were skipped.
    pub error_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ParserState {
    Root,
    Channel,
    DisplayName,
    Programme,
    Title,
    SubTitle,
    Desc,
    Category,
    EpisodeNum,
}

impl ParserState {
    fn collects_text(self) -> bool {
        matches!(
            self,
            ParserState::DisplayName
                | ParserState::Title
                | ParserState::SubTitle
                | ParserState::Desc
                | ParserState::Category
                | ParserState::EpisodeNum
        )
    }
}

/// Parse a guide from a string (small documents, tests).
pub fn parse_str(xml: &str) -> Result<ParsedGuide, String> {
    parse_reader(xml.as_bytes())
}

/// Parse a guide from any buffered reader.
///
/// Recoverable XML errors are counted and skipped; only an I/O failure of the
/// underlying reader aborts the parse.
pub fn parse_reader<R: BufRead>(reader: R) -> Result<ParsedGuide, String> {
    let mut xml_reader = Reader::from_reader(reader);

    let mut guide = ParsedGuide::default();
    let mut buf = Vec::with_capacity(8192);

    let mut state = ParserState::Root;
    let mut current: Option<Programme> = None;
    let mut current_channel: Option<Channel> = None;
    // Where End(programme) should return to: Root or Channel.
    let mut programme_parent = ParserState::Root;
    let mut episode_system = String::new();
    // Text content arrives as a run of fragments: plain text events
    // interleaved with entity references. Fragments are accumulated untrimmed
    // so the whitespace around a reference survives; the whole run is trimmed
    // once at element end.
    let mut text_buf = String::new();

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"channel" if state == ParserState::Root => {
                    state = ParserState::Channel;
                    current_channel = Some(Channel {
                        id: attr(e, b"id").unwrap_or_default(),
                        display_name: String::new(),
                        icon: None,
                    });
                }
                b"display-name" if state == ParserState::Channel => {
                    state = ParserState::DisplayName;
                    text_buf.clear();
                }
                b"programme" if state == ParserState::Root || state == ParserState::Channel => {
                    programme_parent = state;
                    state = ParserState::Programme;
                    current = Some(Programme::from_attributes(e));
                }
                b"title" if state == ParserState::Programme => {
                    state = ParserState::Title;
                    text_buf.clear();
                }
                b"sub-title" if state == ParserState::Programme => {
                    state = ParserState::SubTitle;
                    text_buf.clear();
                }
                b"desc" if state == ParserState::Programme => {
                    state = ParserState::Desc;
                    text_buf.clear();
                }
                b"category" if state == ParserState::Programme => {
                    state = ParserState::Category;
                    text_buf.clear();
                }
                b"episode-num" if state == ParserState::Programme => {
                    state = ParserState::EpisodeNum;
                    episode_system = attr(e, b"system").unwrap_or_default();
                    text_buf.clear();
                }
                b"icon" if state == ParserState::Programme => {
                    if let Some(prog) = current.as_mut() {
                        if prog.icon.is_none() {
                            prog.icon = attr(e, b"src");
                        }
                    }
                }
                b"icon" if state == ParserState::Channel => {
                    if let Some(chan) = current_channel.as_mut() {
                        if chan.icon.is_none() {
                            chan.icon = attr(e, b"src");
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"icon" if state == ParserState::Programme => {
                    if let Some(prog) = current.as_mut() {
                        if prog.icon.is_none() {
                            prog.icon = attr(e, b"src");
                        }
                    }
                }
                b"icon" if state == ParserState::Channel => {
                    if let Some(chan) = current_channel.as_mut() {
                        if chan.icon.is_none() {
                            chan.icon = attr(e, b"src");
                        }
                    }
                }
                // A self-closing programme has no children but is still a record.
                b"programme" if state == ParserState::Root || state == ParserState::Channel => {
                    guide.programmes.push(Programme::from_attributes(e));
                }
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if state.collects_text() {
                    text_buf.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            // Entity references inside text content are delivered as their
            // own events, not inlined into the surrounding Text events.
            Ok(Event::GeneralRef(e)) => {
                if state.collects_text() {
                    resolve_general_ref(&String::from_utf8_lossy(e.as_ref()), &mut text_buf);
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"channel" => {
                    if let Some(chan) = current_channel.take() {
                        if !chan.id.is_empty() {
                            guide.channels.push(chan);
                        }
                    }
                    state = ParserState::Root;
                }
                b"display-name" if state == ParserState::DisplayName => {
                    if let Some(chan) = current_channel.as_mut() {
                        if chan.display_name.is_empty() {
                            chan.display_name = text_buf.trim().to_string();
                        }
                    }
                    state = ParserState::Channel;
                }
                b"programme" => {
                    if let Some(prog) = current.take() {
                        guide.programmes.push(prog);
                    }
                    state = programme_parent;
                }
                b"title" if state == ParserState::Title => {
                    if let Some(prog) = current.as_mut() {
                        if prog.title.is_empty() {
                            prog.title = text_buf.trim().to_string();
                        }
                    }
                    state = ParserState::Programme;
                }
                b"sub-title" if state == ParserState::SubTitle => {
                    if let Some(prog) = current.as_mut() {
                        if prog.sub_title.is_empty() {
                            prog.sub_title = text_buf.trim().to_string();
                        }
                    }
                    state = ParserState::Programme;
                }
                b"desc" if state == ParserState::Desc => {
                    if let Some(prog) = current.as_mut() {
                        if prog.desc.is_empty() {
                            prog.desc = text_buf.trim().to_string();
                        }
                    }
                    state = ParserState::Programme;
                }
                b"category" if state == ParserState::Category => {
                    if let Some(prog) = current.as_mut() {
                        // Guides often list several categories; the first wins.
                        if prog.category.is_empty() {
                            prog.category = text_buf.trim().to_string();
                        }
                    }
                    state = ParserState::Programme;
                }
                b"episode-num" if state == ParserState::EpisodeNum => {
                    if let Some(prog) = current.as_mut() {
                        let value = text_buf.trim().to_string();
                        if prog.episode_num.is_none() && !value.is_empty() {
                            prog.episode_num = Some(EpisodeNum {
                                value,
                                system: std::mem::take(&mut episode_system),
                            });
                        }
                    }
                    state = ParserState::Programme;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(quick_xml::Error::Io(e)) => {
                return Err(format!("Read failed: {}", e));
            }
            Err(_) => {
                // Skip the malformed element and pick up at the next one.
                guide.error_count += 1;
                current = None;
                current_channel = None;
                state = ParserState::Root;
                text_buf.clear();
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(guide)
}

/// Resolve a general entity reference (the part between `&` and `;`) into
/// `out`. Predefined names and numeric character references are decoded;
/// anything unknown is kept literally so no content is silently dropped.
fn resolve_general_ref(name: &str, out: &mut String) {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => num.parse().ok(),
        };
        if let Some(c) = code.and_then(char::from_u32) {
            out.push(c);
            return;
        }
    }

    match name {
        "amp" => out.push('&'),
        "lt" => out.push('<'),
        "gt" => out.push('>'),
        "apos" => out.push('\''),
        "quot" => out.push('"'),
        _ => {
            out.push('&');
            out.push_str(name);
            out.push(';');
        }
    }
}

/// Get an unescaped attribute value from an element.
fn attr(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}
