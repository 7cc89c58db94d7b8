use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of a content-available ping, sent verbatim for silent pushes.
pub const SILENT_BODY: &[u8] = br#"{"aps":{"content-available":1}}"#;

/// How forcefully the notification interrupts the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterruptionLevel {
	Passive,
	Active,
	TimeSensitive,
	Critical,
}

/// The user-visible alert block. Unlike the `aps` level, absent fields are
/// omitted here rather than written as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApsAlert {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	pub body: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub subtitle: Option<String>,
}

/// The `aps` dictionary. Every optional field serializes as an explicit
/// `null` so the wire form is stable across writers; cross-language
/// consumers key off that.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApsMessage {
	#[serde(default)]
	pub alert: Option<ApsAlert>,
	/// Badge count shown on the app icon; 0 clears it.
	#[serde(default)]
	pub badge: Option<i32>,
	#[serde(default)]
	pub sound: Option<String>,
	#[serde(default)]
	pub category: Option<String>,
	/// Conventionally 1, letting a notification service extension rewrite
	/// the payload before display.
	#[serde(default, rename = "mutable-content")]
	pub mutable_content: Option<u32>,
	#[serde(default, rename = "interruption-level")]
	pub interruption_level: Option<InterruptionLevel>,
	/// Set for widget refreshes.
	#[serde(default, rename = "content-changed")]
	pub content_changed: Option<bool>,
}

impl ApsMessage {
	pub fn new() -> ApsMessage {
		ApsMessage::default()
	}

	pub fn with_sound(mut self, sound: impl Into<String>) -> ApsMessage {
		self.sound = Some(sound.into());
		self
	}

	pub fn with_badge(mut self, badge: i32) -> ApsMessage {
		self.badge = Some(badge);
		self
	}

	pub fn with_category(mut self, category: impl Into<String>) -> ApsMessage {
		self.category = Some(category.into());
		self
	}

	pub fn with_mutable_content(mut self) -> ApsMessage {
		self.mutable_content = Some(1);
		self
	}

	pub fn with_interruption_level(mut self, level: InterruptionLevel) -> ApsMessage {
		self.interruption_level = Some(level);
		self
	}
}

/// The outermost envelope: exactly three keys on the wire, `aps` plus a free
/// text slot and a supplemental data map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonAps {
	pub aps: ApsMessage,
	#[serde(default)]
	pub appspecificcontent: Option<String>,
	#[serde(default)]
	pub data: Map<String, Value>,
}

impl JsonAps {
	/// Envelope for a plain alert notification.
	pub fn alert_message(
		title: impl Into<String>,
		body: impl Into<String>,
		subtitle: Option<String>,
	) -> JsonAps {
		JsonAps {
			aps: ApsMessage {
				alert: Some(ApsAlert {
					title: Some(title.into()),
					body: body.into(),
					subtitle,
				}),
				..ApsMessage::default()
			},
			..JsonAps::default()
		}
	}

	/// Envelope for an alert with body text only.
	pub fn body_message(body: impl Into<String>) -> JsonAps {
		JsonAps {
			aps: ApsMessage {
				alert: Some(ApsAlert {
					title: None,
					body: body.into(),
					subtitle: None,
				}),
				..ApsMessage::default()
			},
			..JsonAps::default()
		}
	}

	/// Envelope telling the device to refresh the app's widgets. Everything
	/// except `content-changed` stays null.
	pub fn widget_message() -> JsonAps {
		JsonAps {
			aps: ApsMessage {
				content_changed: Some(true),
				..ApsMessage::default()
			},
			..JsonAps::default()
		}
	}

	pub fn with_aps(mut self, aps: ApsMessage) -> JsonAps {
		self.aps = aps;
		self
	}

	pub fn with_app_specific_content(mut self, content: impl Into<String>) -> JsonAps {
		self.appspecificcontent = Some(content.into());
		self
	}

	/// Adds a supplemental key under `data`.
	///
	/// Panics if `key` is `"aps"`; that key is the envelope itself and
	/// overwriting it is a programming error.
	pub fn add_supplemental(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut JsonAps {
		let key = key.into();
		assert!(key != "aps", "the aps key is reserved for the envelope");
		self.data.insert(key, value.into());
		self
	}
}
