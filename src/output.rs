//! Output projection and serialization
//!
//! A pure, order-preserving map from merged programmes to the external output
//! schema, then rendering as an XMLTV-shaped document or a flat JSON array.
//! Timestamps are echoed as the raw wire strings the source supplied.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::xmltv::{Channel, Programme};

/// Output file format selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Xml,
    Json,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProjectedEpisode {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub system: String,
    pub value: String,
}

/// One record in the external output schema. Optional display fields are
/// omitted when empty rather than rendered as nulls.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectedProgramme {
    pub channel: String,
    pub start: String,
    pub stop: String,
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sub_title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub desc: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_num: Option<ProjectedEpisode>,
}

/// Map merged programmes to the output schema. No filtering, no reordering.
pub fn project(merged: Vec<Programme>) -> Vec<ProjectedProgramme> {
    merged
        .into_iter()
        .map(|p| ProjectedProgramme {
            channel: p.channel,
            start: p.start_raw,
            stop: p.stop_raw,
            title: p.title,
            sub_title: p.sub_title,
            desc: p.desc,
            category: p.category,
            icon: p.icon,
            episode_num: p.episode_num.map(|e| ProjectedEpisode {
                system: e.system,
                value: e.value,
            }),
        })
        .collect()
}

/// Render the retained channel catalog and programmes as an XMLTV-shaped
/// document. Channel elements come first, as in guides on the wire, so the
/// output stands on its own as a guide for downstream players.
pub fn render_xml(channels: &[Channel], programmes: &[ProjectedProgramme]) -> Result<String, String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| format!("XML write failed: {}", e))?;
    writer
        .write_event(Event::Start(BytesStart::new("tv")))
        .map_err(|e| format!("XML write failed: {}", e))?;

    for c in channels {
        let mut elem = BytesStart::new("channel");
        elem.push_attribute(("id", c.id.as_str()));
        writer.write_event(Event::Start(elem)).map_err(|e| format!("XML write failed: {}", e))?;

        if !c.display_name.is_empty() {
            write_text_child(&mut writer, "display-name", &c.display_name)?;
        }
        if let Some(icon) = &c.icon {
            let mut icon_elem = BytesStart::new("icon");
            icon_elem.push_attribute(("src", icon.as_str()));
            writer.write_event(Event::Empty(icon_elem)).map_err(|e| format!("XML write failed: {}", e))?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("channel")))
            .map_err(|e| format!("XML write failed: {}", e))?;
    }

    for p in programmes {
        let mut elem = BytesStart::new("programme");
        elem.push_attribute(("channel", p.channel.as_str()));
        elem.push_attribute(("start", p.start.as_str()));
        elem.push_attribute(("stop", p.stop.as_str()));
        writer.write_event(Event::Start(elem)).map_err(|e| format!("XML write failed: {}", e))?;

        write_text_child(&mut writer, "title", &p.title)?;
        if !p.sub_title.is_empty() {
            write_text_child(&mut writer, "sub-title", &p.sub_title)?;
        }
        if !p.desc.is_empty() {
            write_text_child(&mut writer, "desc", &p.desc)?;
        }
        if !p.category.is_empty() {
            write_text_child(&mut writer, "category", &p.category)?;
        }
        if let Some(icon) = &p.icon {
            let mut icon_elem = BytesStart::new("icon");
            icon_elem.push_attribute(("src", icon.as_str()));
            writer.write_event(Event::Empty(icon_elem)).map_err(|e| format!("XML write failed: {}", e))?;
        }
        if let Some(episode) = &p.episode_num {
            let mut ep_elem = BytesStart::new("episode-num");
            if !episode.system.is_empty() {
                ep_elem.push_attribute(("system", episode.system.as_str()));
            }
            writer.write_event(Event::Start(ep_elem)).map_err(|e| format!("XML write failed: {}", e))?;
            writer
                .write_event(Event::Text(BytesText::new(&episode.value)))
                .map_err(|e| format!("XML write failed: {}", e))?;
            writer
                .write_event(Event::End(BytesEnd::new("episode-num")))
                .map_err(|e| format!("XML write failed: {}", e))?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("programme")))
            .map_err(|e| format!("XML write failed: {}", e))?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("tv")))
        .map_err(|e| format!("XML write failed: {}", e))?;

    String::from_utf8(writer.into_inner()).map_err(|e| format!("XML write failed: {}", e))
}

fn write_text_child<W: std::io::Write>(
    writer: &mut Writer<W>,
    tag: &str,
    text: &str,
) -> Result<(), String> {
    writer
        .write_event(Event::Start(BytesStart::new(tag)))
        .map_err(|e| format!("XML write failed: {}", e))?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(|e| format!("XML write failed: {}", e))?;
    writer
        .write_event(Event::End(BytesEnd::new(tag)))
        .map_err(|e| format!("XML write failed: {}", e))?;
    Ok(())
}

/// Render programmes as a pretty-printed JSON array.
pub fn render_json(programmes: &[ProjectedProgramme]) -> Result<String, String> {
    serde_json::to_string_pretty(programmes).map_err(|e| format!("JSON encoding failed: {}", e))
}

/// Write the final document. A filesystem failure here is fatal for the run,
/// unlike anything that happens per source. The channel catalog only appears
/// in the XML format; the JSON output stays a flat programme array.
pub fn write_output(
    path: &Path,
    format: OutputFormat,
    channels: &[Channel],
    programmes: &[ProjectedProgramme],
) -> Result<(), String> {
    let rendered = match format {
        OutputFormat::Xml => render_xml(channels, programmes)?,
        OutputFormat::Json => render_json(programmes)?,
    };
    fs::write(path, rendered).map_err(|e| format!("Write failed for {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xmltv::EpisodeNum;

    fn sample() -> Programme {
        Programme {
            channel: "La 1 HD".to_string(),
            start: None,
            stop: None,
            start_raw: "20250101060001 +0000".to_string(),
            stop_raw: "20250101070000 +0000".to_string(),
            title: "Morning Show".to_string(),
            sub_title: String::new(),
            desc: "News & weather".to_string(),
            category: "News".to_string(),
            icon: Some("http://example.com/icon.png".to_string()),
            episode_num: Some(EpisodeNum {
                value: "1.9.0".to_string(),
                system: "xmltv_ns".to_string(),
            }),
        }
    }

    #[test]
    fn projection_preserves_order_and_raw_timestamps() {
        let mut second = sample();
        second.title = "Second".to_string();
        let projected = project(vec![sample(), second]);

        assert_eq!(projected.len(), 2);
        assert_eq!(projected[0].title, "Morning Show");
        assert_eq!(projected[1].title, "Second");
        assert_eq!(projected[0].start, "20250101060001 +0000");
        assert_eq!(projected[0].stop, "20250101070000 +0000");
    }

    #[test]
    fn xml_output_carries_attributes_and_children() {
        let xml = render_xml(&[], &project(vec![sample()])).unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains(
            "<programme channel=\"La 1 HD\" start=\"20250101060001 +0000\" stop=\"20250101070000 +0000\">"
        ));
        assert!(xml.contains("<title>Morning Show</title>"));
        assert!(xml.contains("<desc>News &amp; weather</desc>"));
        assert!(xml.contains("<category>News</category>"));
        assert!(xml.contains("<icon src=\"http://example.com/icon.png\"/>"));
        assert!(xml.contains("<episode-num system=\"xmltv_ns\">1.9.0</episode-num>"));
        // Empty sub-title is omitted, not rendered hollow.
        assert!(!xml.contains("sub-title"));
        assert!(xml.contains("</tv>"));
    }

    #[test]
    fn json_output_omits_empty_optionals() {
        let mut programme = sample();
        programme.icon = None;
        programme.episode_num = None;
        let json = render_json(&project(vec![programme])).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let record = &value.as_array().unwrap()[0];
        assert_eq!(record["channel"], "La 1 HD");
        assert_eq!(record["title"], "Morning Show");
        assert_eq!(record["desc"], "News & weather");
        assert!(record.get("sub_title").is_none());
        assert!(record.get("icon").is_none());
        assert!(record.get("episode_num").is_none());
    }

    #[test]
    fn xml_output_lists_channels_before_programmes() {
        let channels = vec![Channel {
            id: "La 1 HD".to_string(),
            display_name: "La 1 HD".to_string(),
            icon: Some("http://example.com/la1.png".to_string()),
        }];
        let xml = render_xml(&channels, &project(vec![sample()])).unwrap();

        assert!(xml.contains("<channel id=\"La 1 HD\">"));
        assert!(xml.contains("<display-name>La 1 HD</display-name>"));
        assert!(xml.contains("<icon src=\"http://example.com/la1.png\"/>"));
        assert!(xml.contains("</channel>"));
        let channel_at = xml.find("<channel ").unwrap();
        let programme_at = xml.find("<programme ").unwrap();
        assert!(channel_at < programme_at);
    }

    #[test]
    fn empty_result_is_still_a_valid_document() {
        let xml = render_xml(&[], &[]).unwrap();
        assert!(xml.contains("<tv>"));
        let json = render_json(&[]).unwrap();
        assert_eq!(json.trim(), "[]");
    }
}
