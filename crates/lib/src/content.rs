//! Message content: content-type codes, text/picture elements and the normalized
//! content map handed to the send API.

use crate::http::{CallContext, TransportError};
use crate::qa::Answerer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Generic field-name → value mapping sent as `content` in the send request.
pub type ContentMap = Map<String, Value>;

const TEXT_CODE: i32 = 101;
const PICTURE_CODE: i32 = 102;

/// Message content type as carried on the wire (integer code).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum ContentType {
    Text,
    Picture,
    /// Any other platform code (voice, video, file, ...), kept verbatim.
    Other(i32),
}

impl From<i32> for ContentType {
    fn from(code: i32) -> Self {
        match code {
            TEXT_CODE => ContentType::Text,
            PICTURE_CODE => ContentType::Picture,
            other => ContentType::Other(other),
        }
    }
}

impl From<ContentType> for i32 {
    fn from(ct: ContentType) -> Self {
        match ct {
            ContentType::Text => TEXT_CODE,
            ContentType::Picture => PICTURE_CODE,
            ContentType::Other(code) => code,
        }
    }
}

impl Default for ContentType {
    fn default() -> Self {
        ContentType::Other(0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("content type {0} is not supported")]
    Unsupported(i32),
    #[error("invalid {kind} content: {source}")]
    Invalid {
        kind: &'static str,
        source: serde_json::Error,
    },
}

/// Errors from building the content map: bad element, or the QA call failed in transit.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextElem {
    #[serde(default)]
    pub content: String,
}

/// One picture rendition (source, big or snapshot).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PictureBaseInfo {
    #[serde(default)]
    pub uuid: String,
    #[serde(rename = "type", default)]
    pub typ: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub width: i32,
    #[serde(default)]
    pub height: i32,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PictureElem {
    #[serde(default)]
    pub source_path: String,
    #[serde(default)]
    pub source_picture: PictureBaseInfo,
    #[serde(default)]
    pub big_picture: PictureBaseInfo,
    #[serde(default)]
    pub snapshot_picture: PictureBaseInfo,
}

/// Reduce a MIME type such as `image/png` to its subtype (`png`). Types without `/` are returned unchanged.
pub fn mime_subtype(typ: &str) -> &str {
    match typ.split_once('/') {
        Some((_, rest)) => rest.split('/').next().unwrap_or(rest),
        None => typ,
    }
}

impl PictureElem {
    /// Backfill an empty snapshot type from the source, then reduce every MIME type to its subtype.
    pub fn normalize_types(&mut self) {
        if self.snapshot_picture.typ.is_empty() {
            self.snapshot_picture.typ = self.source_picture.typ.clone();
        }
        for pic in [
            &mut self.source_picture,
            &mut self.big_picture,
            &mut self.snapshot_picture,
        ] {
            let reduced = mime_subtype(&pic.typ).to_string();
            pic.typ = reduced;
        }
    }

    /// Normalized content map: the three renditions as nested objects plus the source path.
    pub fn into_content_map(mut self) -> ContentMap {
        self.normalize_types();
        let mut map = ContentMap::new();
        map.insert(
            "snapshotPicture".to_string(),
            picture_value(&self.snapshot_picture),
        );
        map.insert("bigPicture".to_string(), picture_value(&self.big_picture));
        map.insert(
            "sourcePicture".to_string(),
            picture_value(&self.source_picture),
        );
        map.insert("sourcePath".to_string(), Value::String(self.source_path));
        map
    }
}

fn picture_value(pic: &PictureBaseInfo) -> Value {
    let mut m = Map::new();
    m.insert("uuid".to_string(), Value::String(pic.uuid.clone()));
    m.insert("type".to_string(), Value::String(pic.typ.clone()));
    m.insert("size".to_string(), Value::from(pic.size));
    m.insert("width".to_string(), Value::from(pic.width));
    m.insert("height".to_string(), Value::from(pic.height));
    m.insert("url".to_string(), Value::String(pic.url.clone()));
    Value::Object(m)
}

/// Text map shape: `{content: text}`.
pub fn text_content_map(text: impl Into<String>) -> ContentMap {
    let mut map = ContentMap::new();
    map.insert("content".to_string(), Value::String(text.into()));
    map
}

/// Decoded message element, one variant per supported content type.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Text(TextElem),
    Picture(PictureElem),
}

impl MessageContent {
    /// Decode the callback's raw `content` string for the declared content type.
    /// A JSON `null` decodes to an empty element.
    pub fn decode(content_type: ContentType, raw: &str) -> Result<Self, DecodeError> {
        match content_type {
            ContentType::Text => serde_json::from_str::<Option<TextElem>>(raw)
                .map(|elem| MessageContent::Text(elem.unwrap_or_default()))
                .map_err(|source| DecodeError::Invalid {
                    kind: "text",
                    source,
                }),
            ContentType::Picture => serde_json::from_str::<Option<PictureElem>>(raw)
                .map(|elem| MessageContent::Picture(elem.unwrap_or_default()))
                .map_err(|source| DecodeError::Invalid {
                    kind: "picture",
                    source,
                }),
            ContentType::Other(code) => Err(DecodeError::Unsupported(code)),
        }
    }
}

/// Build the reply's content map. Text is answered through `answerer`; pictures are echoed back normalized.
pub async fn normalize(
    ctx: &CallContext,
    content_type: ContentType,
    raw: &str,
    answerer: &dyn Answerer,
) -> Result<ContentMap, NormalizeError> {
    match MessageContent::decode(content_type, raw)? {
        MessageContent::Text(text) => {
            log::debug!("callback text: {:?}", text.content);
            let answer = answerer.answer(ctx, &text.content).await?;
            Ok(text_content_map(answer))
        }
        MessageContent::Picture(picture) => {
            log::debug!("callback picture: {:?}", picture.source_picture.url);
            Ok(picture.into_content_map())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedAnswer {
        answer: &'static str,
        asked: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Answerer for FixedAnswer {
        async fn answer(&self, _ctx: &CallContext, question: &str) -> Result<String, TransportError> {
            self.asked.lock().unwrap().push(question.to_string());
            Ok(self.answer.to_string())
        }
    }

    fn fixed(answer: &'static str) -> FixedAnswer {
        FixedAnswer {
            answer,
            asked: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn content_type_codes() {
        assert_eq!(ContentType::from(101), ContentType::Text);
        assert_eq!(ContentType::from(102), ContentType::Picture);
        assert_eq!(ContentType::from(103), ContentType::Other(103));
        assert_eq!(i32::from(ContentType::Picture), 102);
        let ct: ContentType = serde_json::from_str("101").unwrap();
        assert_eq!(ct, ContentType::Text);
        assert_eq!(serde_json::to_string(&ContentType::Other(110)).unwrap(), "110");
    }

    #[test]
    fn mime_subtype_is_idempotent() {
        assert_eq!(mime_subtype("image/png"), "png");
        assert_eq!(mime_subtype("png"), "png");
        assert_eq!(mime_subtype(mime_subtype("image/jpeg")), "jpeg");
        assert_eq!(mime_subtype(""), "");
    }

    #[test]
    fn snapshot_type_backfilled_from_source() {
        let mut pic = PictureElem {
            source_picture: PictureBaseInfo {
                typ: "image/png".to_string(),
                ..Default::default()
            },
            big_picture: PictureBaseInfo {
                typ: "image/png".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        pic.normalize_types();
        assert_eq!(pic.source_picture.typ, "png");
        assert_eq!(pic.big_picture.typ, "png");
        assert_eq!(pic.snapshot_picture.typ, "png");
    }

    #[test]
    fn picture_content_map_shape() {
        let raw = r#"{
            "sourcePath": "/tmp/cat.jpg",
            "sourcePicture": {"uuid":"s1","type":"image/jpeg","size":2048,"width":800,"height":600,"url":"http://img/s1"},
            "bigPicture": {"uuid":"b1","type":"image/jpeg","size":1024,"width":400,"height":300,"url":"http://img/b1"},
            "snapshotPicture": {"uuid":"t1","type":"","size":128,"width":80,"height":60,"url":"http://img/t1"}
        }"#;
        let MessageContent::Picture(pic) = MessageContent::decode(ContentType::Picture, raw).unwrap() else {
            panic!("expected picture");
        };
        let map = pic.into_content_map();
        assert_eq!(map.len(), 4);
        assert_eq!(map["sourcePath"], "/tmp/cat.jpg");
        assert_eq!(map["sourcePicture"]["type"], "jpeg");
        assert_eq!(map["bigPicture"]["url"], "http://img/b1");
        assert_eq!(map["snapshotPicture"]["type"], "jpeg");
        assert_eq!(map["snapshotPicture"]["size"], 128);
        assert_eq!(map["snapshotPicture"]["width"], 80);
    }

    #[test]
    fn decode_rejects_invalid_and_unsupported() {
        let err = MessageContent::decode(ContentType::Text, "not json").unwrap_err();
        assert!(matches!(err, DecodeError::Invalid { kind: "text", .. }));
        let err = MessageContent::decode(ContentType::Other(103), "{}").unwrap_err();
        assert!(matches!(err, DecodeError::Unsupported(103)));
    }

    #[test]
    fn null_content_decodes_to_empty_element() {
        assert_eq!(
            MessageContent::decode(ContentType::Text, "null").unwrap(),
            MessageContent::Text(TextElem::default())
        );
        assert_eq!(
            MessageContent::decode(ContentType::Picture, " null ").unwrap(),
            MessageContent::Picture(PictureElem::default())
        );
    }

    #[tokio::test]
    async fn null_text_still_gets_an_answer() {
        let answerer = fixed("anything else?");
        let map = normalize(&CallContext::background(), ContentType::Text, "null", &answerer)
            .await
            .unwrap();
        assert_eq!(map, text_content_map("anything else?"));
        assert_eq!(*answerer.asked.lock().unwrap(), vec![String::new()]);
    }

    #[tokio::test]
    async fn text_is_replaced_by_answer() {
        let answerer = fixed("hi there");
        let map = normalize(
            &CallContext::background(),
            ContentType::Text,
            r#"{"content":"hello"}"#,
            &answerer,
        )
        .await
        .unwrap();
        assert_eq!(map, text_content_map("hi there"));
        assert_eq!(*answerer.asked.lock().unwrap(), vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn picture_does_not_ask_backend() {
        let answerer = fixed("unused");
        let raw = r#"{"sourcePath":"p","sourcePicture":{"type":"image/gif"}}"#;
        let map = normalize(&CallContext::background(), ContentType::Picture, raw, &answerer)
            .await
            .unwrap();
        assert_eq!(map["snapshotPicture"]["type"], "gif");
        assert!(answerer.asked.lock().unwrap().is_empty());
    }
}
