//! Builders turning raw sources into [`Channel`] entities.
//!
//! Three source shapes are supported:
//!
//! | Builder | Source |
//! |---------|--------|
//! | [`Channel::from_json`] | a YouTube subscription or channel resource |
//! | [`Channel::from_string_list`] | values in [`CHANNEL_FIELDS`] order |
//! | [`Channel::from_map`] | field name → string, raw bytes, or JSON cell |
//!
//! All of them apply the same policy: the id is required, so failing to
//! read it aborts the entity and stops processing; every other field is
//! optional, so a failure only adds a warning and leaves the sentinel.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::coerce::{
    is_missing, json_kind, json_mapping, json_presence, json_string, json_text, CoercionFailure,
    RawField, MISSING_VALUE,
};
use crate::models::{Channel, CHANNEL_FIELDS, THUMBNAIL_SIZES};

/// One raw record, in any of the supported shapes.
#[derive(Debug, Clone)]
pub enum RawSource {
    Json(Value),
    List(Vec<String>),
    Map(BTreeMap<String, String>),
    Bytes(BTreeMap<String, Vec<u8>>),
    /// A positional record whose cells are still JSON values.
    ValueList(Vec<Value>),
    /// A keyed record whose cells are still JSON values.
    ValueMap(BTreeMap<String, Value>),
}

impl RawSource {
    /// Run the builder matching this shape.
    pub fn build(&self) -> Channel {
        match self {
            RawSource::Json(value) => Channel::from_json(value),
            RawSource::List(values) => Channel::from_string_list(values),
            RawSource::Map(map) => Channel::from_map(map),
            RawSource::Bytes(map) => Channel::from_map(map),
            RawSource::ValueList(values) => Channel::from_string_list(values),
            RawSource::ValueMap(map) => Channel::from_map(map),
        }
    }

    /// JSON rendition of the whole source, used when reporting aborts.
    pub fn payload(&self) -> Value {
        match self {
            RawSource::Json(value) => value.clone(),
            RawSource::List(values) => Value::from(values.clone()),
            RawSource::Map(map) => map_payload(map),
            RawSource::Bytes(map) => map_payload(map),
            RawSource::ValueList(values) => Value::Array(values.clone()),
            RawSource::ValueMap(map) => map_payload(map),
        }
    }
}

fn map_payload<V: RawField>(map: &BTreeMap<String, V>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), v.payload()))
            .collect(),
    )
}

/// Keep the value of an optional field, or record a warning and return `None`.
fn optional<T>(channel: &mut Channel, result: Result<T, CoercionFailure>, payload: Value) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            channel
                .diagnostics_mut()
                .add_warning(format!("Skipped optional field: {}", e), payload);
            None
        }
    }
}

fn check_published_at(channel: &mut Channel) {
    if !is_missing(&channel.published_at) && channel.published_at_datetime().is_none() {
        let payload = Value::String(channel.published_at.clone());
        channel
            .diagnostics_mut()
            .add_warning("published_at is not a valid ISO-8601 timestamp", payload);
    }
}

fn fragment(container: &Value, field: &str) -> Value {
    container.get(field).cloned().unwrap_or(Value::Null)
}

/// Locate the channel id in a JSON resource.
///
/// A `resourceId` object (under `snippet` or at the top level) names the
/// channel a subscription points at; the top-level `id` of such a resource
/// belongs to the subscription itself and is ignored. Only when no
/// `resourceId` exists is the top-level `id` used.
fn json_identifier(root: &Value, fields: &Value) -> Result<String, CoercionFailure> {
    let resource = fields
        .get("resourceId")
        .or_else(|| root.get("resourceId"))
        .filter(|v| !v.is_null());

    match resource {
        Some(resource) if resource.is_object() => {
            let id = json_string(resource, "channelId")?;
            if !is_missing(&id) {
                return Ok(id);
            }
            json_string(resource, "id")
        }
        Some(other) => Err(CoercionFailure::WrongShape {
            field: "resourceId".to_string(),
            expected: "an object",
            found: json_kind(other),
        }),
        None => json_string(root, "id"),
    }
}

impl Channel {
    /// Build from a YouTube `subscription` or `channel` resource.
    ///
    /// Scalar fields are read from `snippet` when it exists, otherwise from
    /// the top level. Playlist presence comes from
    /// `contentDetails.relatedPlaylists`.
    pub fn from_json(source: &Value) -> Channel {
        let mut channel = Channel::empty();
        let fields = source
            .get("snippet")
            .filter(|s| s.is_object())
            .unwrap_or(source);

        match json_identifier(source, fields) {
            Ok(id) if !is_missing(&id) => {
                channel.set_id(id);
            }
            Ok(_) => {
                channel
                    .diagnostics_mut()
                    .abort("Channel resource has no identifier", source.clone());
                return channel;
            }
            Err(e) => {
                channel.diagnostics_mut().abort(
                    format!("Unable to read channel identifier: {}", e),
                    source.clone(),
                );
                return channel;
            }
        }

        if let Some(title) = optional(&mut channel, json_text(fields, "title"), fragment(fields, "title")) {
            channel.title = title;
        }
        if let Some(description) = optional(
            &mut channel,
            json_text(fields, "description"),
            fragment(fields, "description"),
        ) {
            channel.description = description;
        }
        if let Some(published_at) = optional(
            &mut channel,
            json_string(fields, "publishedAt"),
            fragment(fields, "publishedAt"),
        ) {
            channel.published_at = published_at;
            check_published_at(&mut channel);
        }
        if let Some(thumbnails) = optional(
            &mut channel,
            json_mapping(fields, "thumbnails", &THUMBNAIL_SIZES),
            fragment(fields, "thumbnails"),
        ) {
            channel.thumbnails = thumbnails;
        }

        let related = source
            .get("contentDetails")
            .and_then(|c| c.get("relatedPlaylists"))
            .cloned()
            .unwrap_or(Value::Null);
        if let Some(present) = optional(
            &mut channel,
            json_presence(&related, "uploads"),
            fragment(&related, "uploads"),
        ) {
            channel.has_uploads_playlist = present;
        }
        if let Some(present) = optional(
            &mut channel,
            json_presence(&related, "favorites"),
            fragment(&related, "favorites"),
        ) {
            channel.has_favourites_playlist = present;
        }
        if let Some(present) = optional(
            &mut channel,
            json_presence(&related, "likes"),
            fragment(&related, "likes"),
        ) {
            channel.has_likes_playlist = present;
        }

        channel
    }

    /// Build from values laid out in [`CHANNEL_FIELDS`] order.
    ///
    /// Cells may be strings, JSON values, or `Option`s of either (see
    /// [`RawField`]). Missing trailing positions resolve to sentinels. Extra
    /// values past the documented fields are reported as a warning and
    /// otherwise ignored.
    pub fn from_string_list<V: RawField>(values: &[V]) -> Channel {
        let payload = Value::Array(values.iter().map(|v| v.payload()).collect());
        let mut channel = from_fields(
            |field| {
                let position = CHANNEL_FIELDS.iter().position(|f| *f == field);
                match position.and_then(|i| values.get(i)) {
                    Some(v) => (v.raw_text(field), v.payload()),
                    None => (Ok(None), Value::Null),
                }
            },
            payload.clone(),
        );

        if !channel.was_aborted() && values.len() > CHANNEL_FIELDS.len() {
            channel.diagnostics_mut().add_warning(
                format!(
                    "Ignored {} values beyond the {} known fields",
                    values.len() - CHANNEL_FIELDS.len(),
                    CHANNEL_FIELDS.len()
                ),
                payload,
            );
        }

        channel
    }

    /// Build from a map keyed by [`CHANNEL_FIELDS`] names.
    ///
    /// Values may be strings, raw byte buffers, or JSON cells (see
    /// [`RawField`]). Unknown keys are ignored.
    pub fn from_map<V: RawField>(map: &BTreeMap<String, V>) -> Channel {
        from_fields(
            |field| match map.get(field) {
                Some(v) => (v.raw_text(field), v.payload()),
                None => (Ok(None), Value::Null),
            },
            map_payload(map),
        )
    }
}

/// Shared policy for the flat shapes. `lookup` returns the raw text of a
/// field (`None` when absent) together with its payload.
fn from_fields<F>(lookup: F, source_payload: Value) -> Channel
where
    F: Fn(&str) -> (Result<Option<String>, CoercionFailure>, Value),
{
    let mut channel = Channel::empty();

    match lookup("id") {
        (Ok(Some(id)), _) if !is_missing(&id) => {
            channel.set_id(id);
        }
        (Ok(_), _) => {
            channel
                .diagnostics_mut()
                .abort("Channel record has no identifier", source_payload);
            return channel;
        }
        (Err(e), _) => {
            channel.diagnostics_mut().abort(
                format!("Unable to read channel identifier: {}", e),
                source_payload,
            );
            return channel;
        }
    }

    let raw = |channel: &mut Channel, field: &str| -> Option<Option<String>> {
        let (result, payload) = lookup(field);
        optional(channel, result, payload)
    };
    // Absent and empty both collapse to the sentinel.
    let text = |channel: &mut Channel, field: &str| -> Option<String> {
        raw(channel, field).map(|value| {
            value
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| MISSING_VALUE.to_string())
        })
    };

    if let Some(present) = text(&mut channel, "uploads_playlist") {
        channel.has_uploads_playlist = !is_missing(&present);
    }
    if let Some(present) = text(&mut channel, "favourites_playlist") {
        channel.has_favourites_playlist = !is_missing(&present);
    }
    if let Some(present) = text(&mut channel, "likes_playlist") {
        channel.has_likes_playlist = !is_missing(&present);
    }
    if let Some(title) = text(&mut channel, "title") {
        channel.title = title;
    }
    // Free text: an empty description is a value, not an absence.
    if let Some(description) = raw(&mut channel, "description") {
        channel.description = description.unwrap_or_else(|| MISSING_VALUE.to_string());
    }
    if let Some(published_at) = text(&mut channel, "published_at") {
        channel.published_at = published_at;
        check_published_at(&mut channel);
    }
    for size in THUMBNAIL_SIZES {
        if let Some(url) = text(&mut channel, &format!("thumbnail_{}", size)) {
            if !is_missing(&url) {
                channel.thumbnails.insert(size.to_string(), url);
            }
        }
    }

    channel
}
