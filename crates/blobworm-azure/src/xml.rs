//! XML bodies: container listings, error bodies and tag sets.

use std::borrow::Cow;

use blobworm_core::domain::{BlobPage, BlobRecord, BlobTag, ImmutabilityPolicyMode, TagSet};
use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;

use crate::pipeline::parse_http_date;

/// Parses an `EnumerationResults` body from List Blobs.
///
/// A blob gets `tags: Some(..)` only when its entry carries a `Tags`
/// element. An empty `NextMarker` ends the listing. Names, tag keys and tag
/// values are kept byte for byte; they address the blob in later requests.
pub(crate) fn parse_list_blobs(body: &str) -> Result<BlobPage, String> {
    let mut reader = Reader::from_str(body);

    let mut parser = ListParser::default();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                parser.open(&name);
                parser.path.push(name);
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                parser.open(&name);
                parser.path.push(name);
                parser.close()?;
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| format!("invalid text at {}: {e}", reader.buffer_position()))?;
                parser.text(text)?;
            }
            Ok(Event::End(_)) => parser.close()?,
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "invalid XML at {}: {e}",
                    reader.buffer_position()
                ));
            }
            _ => {}
        }
        buf.clear();
    }

    if !parser.path.is_empty() {
        return Err("listing ended inside an element".to_string());
    }
    Ok(parser.page)
}

#[derive(Default)]
struct ListParser {
    path: Vec<String>,
    page: BlobPage,
    blob: Option<BlobRecord>,
    tag: Option<(Option<String>, Option<String>)>,
}

impl ListParser {
    /// `name` is about to be pushed; `path` still ends at its parent.
    fn open(&mut self, name: &str) {
        match (self.path.last().map(String::as_str), name) {
            (Some("Blobs"), "Blob") => self.blob = Some(BlobRecord::new("")),
            (Some("Blob"), "Tags") => {
                if let Some(blob) = self.blob.as_mut() {
                    blob.tags.get_or_insert_with(Vec::new);
                }
            }
            (Some("TagSet"), "Tag") => self.tag = Some((None, None)),
            _ => {}
        }
    }

    fn close(&mut self) -> Result<(), String> {
        let name = self.path.pop().unwrap_or_default();
        match (self.path.last().map(String::as_str), name.as_str()) {
            (Some("Blobs"), "Blob") => {
                if let Some(blob) = self.blob.take() {
                    if blob.name.is_empty() {
                        return Err("blob entry without a name".to_string());
                    }
                    self.page.blobs.push(blob);
                }
            }
            (Some("TagSet"), "Tag") => {
                if let (Some((Some(key), value)), Some(blob)) = (self.tag.take(), self.blob.as_mut()) {
                    blob.tags
                        .get_or_insert_with(Vec::new)
                        .push(BlobTag::new(key, value.unwrap_or_default()));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn text(&mut self, text: Cow<'_, str>) -> Result<(), String> {
        let depth = self.path.len();
        if depth < 2 {
            return Ok(());
        }
        let parent = self.path[depth - 2].as_str();
        let current = self.path[depth - 1].as_str();
        if text.trim().is_empty() && !matches!(current, "Name" | "Key" | "Value") {
            return Ok(());
        }

        match (parent, current) {
            ("EnumerationResults", "NextMarker") => {
                if !text.is_empty() {
                    self.page.next_marker = Some(text.into_owned());
                }
            }
            ("Blob", "Name") => {
                if let Some(blob) = self.blob.as_mut() {
                    blob.name = text.into_owned();
                }
            }
            ("Properties", "ImmutabilityPolicyUntilDate") => {
                let expiry = parse_http_date(&text)
                    .ok_or_else(|| format!("invalid ImmutabilityPolicyUntilDate {text:?}"))?;
                if let Some(blob) = self.blob.as_mut() {
                    blob.expires_on = Some(expiry);
                }
            }
            ("Properties", "ImmutabilityPolicyMode") => {
                if let Some(blob) = self.blob.as_mut() {
                    blob.policy_mode = ImmutabilityPolicyMode::parse_str(&text);
                }
            }
            ("Metadata", key) => {
                let key = key.to_string();
                if let Some(blob) = self.blob.as_mut() {
                    blob.metadata.insert(key, text.into_owned());
                }
            }
            ("Tag", "Key") => {
                if let Some(tag) = self.tag.as_mut() {
                    tag.0 = Some(text.into_owned());
                }
            }
            ("Tag", "Value") => {
                if let Some(tag) = self.tag.as_mut() {
                    tag.1 = Some(text.into_owned());
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// `Code` and `Message` of a service error body.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct ErrorBody {
    pub code: Option<String>,
    pub message: Option<String>,
}

/// Lenient: anything unreadable yields an empty `ErrorBody`.
pub(crate) fn parse_error_body(body: &str) -> ErrorBody {
    let mut reader = Reader::from_str(body);
    reader.trim_text(true);

    let mut out = ErrorBody::default();
    let mut current: Option<String> = None;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                current = Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::Text(e)) => {
                let Ok(text) = e.unescape() else { break };
                match current.as_deref() {
                    Some("Code") => out.code = Some(text.into_owned()),
                    Some("Message") => out.message = Some(text.into_owned()),
                    _ => {}
                }
            }
            Ok(Event::End(_)) => current = None,
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    out
}

/// Body for Set Blob Tags.
pub(crate) fn tags_body(tags: &TagSet) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="utf-8"?><Tags><TagSet>"#);
    for (key, value) in tags {
        xml.push_str("<Tag><Key>");
        xml.push_str(&escape(key.as_str()));
        xml.push_str("</Key><Value>");
        xml.push_str(&escape(value.as_str()));
        xml.push_str("</Value></Tag>");
    }
    xml.push_str("</TagSet></Tags>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const LISTING: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<EnumerationResults ServiceEndpoint="https://acct.blob.core.windows.net/" ContainerName="c1">
  <MaxResults>2</MaxResults>
  <Blobs>
    <Blob>
      <Name>a.txt</Name>
      <Properties>
        <Content-Length>3</Content-Length>
        <ImmutabilityPolicyUntilDate>Sat, 24 Oct 2026 08:00:00 GMT</ImmutabilityPolicyUntilDate>
        <ImmutabilityPolicyMode>unlocked</ImmutabilityPolicyMode>
      </Properties>
      <Metadata>
        <owner>ops</owner>
      </Metadata>
      <Tags>
        <TagSet>
          <Tag><Key>tag</Key><Value>set</Value></Tag>
          <Tag><Key>q</Key><Value>a &amp; b</Value></Tag>
        </TagSet>
      </Tags>
    </Blob>
    <Blob>
      <Name>b.txt</Name>
      <Properties>
        <Content-Length>0</Content-Length>
      </Properties>
      <Metadata />
    </Blob>
  </Blobs>
  <NextMarker>2!48!YmxvYg--</NextMarker>
</EnumerationResults>"#;

    #[test]
    fn listing_yields_records_and_marker() {
        let page = parse_list_blobs(LISTING).unwrap();
        assert_eq!(page.blobs.len(), 2);
        assert_eq!(page.next_marker.as_deref(), Some("2!48!YmxvYg--"));

        let a = &page.blobs[0];
        assert_eq!(a.name, "a.txt");
        assert_eq!(
            a.expires_on,
            Some(Utc.with_ymd_and_hms(2026, 10, 24, 8, 0, 0).unwrap())
        );
        assert_eq!(a.policy_mode, Some(ImmutabilityPolicyMode::Unlocked));
        assert_eq!(a.metadata.get("owner").map(String::as_str), Some("ops"));
        assert_eq!(
            a.tags,
            Some(vec![BlobTag::new("tag", "set"), BlobTag::new("q", "a & b")])
        );

        let b = &page.blobs[1];
        assert_eq!(b.name, "b.txt");
        assert_eq!(b.expires_on, None);
        assert_eq!(b.tags, None);
        assert!(b.metadata.is_empty());
    }

    #[test]
    fn names_and_tags_keep_their_whitespace() {
        let body = "<EnumerationResults>\n  <Blobs>\n    <Blob><Name>  sp  </Name><Tags><TagSet><Tag><Key> k </Key><Value>v </Value></Tag></TagSet></Tags></Blob>\n  </Blobs>\n  <NextMarker>\n  </NextMarker>\n</EnumerationResults>";
        let page = parse_list_blobs(body).unwrap();

        assert_eq!(page.blobs.len(), 1);
        assert_eq!(page.blobs[0].name, "  sp  ");
        assert_eq!(page.blobs[0].tags, Some(vec![BlobTag::new(" k ", "v ")]));
        assert_eq!(page.next_marker, None);
    }

    #[test]
    fn empty_tags_element_is_an_empty_set() {
        let body = "<EnumerationResults><Blobs><Blob><Name>x</Name><Tags><TagSet/></Tags></Blob></Blobs><NextMarker/></EnumerationResults>";
        let page = parse_list_blobs(body).unwrap();
        assert_eq!(page.blobs[0].tags, Some(Vec::new()));
        assert_eq!(page.next_marker, None);
    }

    #[test]
    fn bad_expiry_is_rejected() {
        let body = "<EnumerationResults><Blobs><Blob><Name>x</Name><Properties><ImmutabilityPolicyUntilDate>soon</ImmutabilityPolicyUntilDate></Properties></Blob></Blobs></EnumerationResults>";
        let err = parse_list_blobs(body).unwrap_err();
        assert!(err.contains("ImmutabilityPolicyUntilDate"), "{err}");
    }

    #[test]
    fn truncated_listing_is_rejected() {
        assert!(parse_list_blobs("<EnumerationResults><Blobs><Blob><Name>x</Name>").is_err());
    }

    #[test]
    fn error_body_code_and_message() {
        let body = r#"<?xml version="1.0" encoding="utf-8"?><Error><Code>ContainerNotFound</Code><Message>The specified container does not exist.
RequestId:abc</Message></Error>"#;
        let parsed = parse_error_body(body);
        assert_eq!(parsed.code.as_deref(), Some("ContainerNotFound"));
        assert!(parsed.message.unwrap().starts_with("The specified container"));

        assert_eq!(parse_error_body(""), ErrorBody::default());
    }

    #[test]
    fn tags_body_escapes_values() {
        let mut tags = TagSet::new();
        tags.insert("tag".to_string(), "set".to_string());
        tags.insert("k".to_string(), "<a&b>".to_string());
        assert_eq!(
            tags_body(&tags),
            r#"<?xml version="1.0" encoding="utf-8"?><Tags><TagSet><Tag><Key>k</Key><Value>&lt;a&amp;b&gt;</Value></Tag><Tag><Key>tag</Key><Value>set</Value></Tag></TagSet></Tags>"#
        );
    }
}
