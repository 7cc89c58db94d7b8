use std::borrow::Cow;

use http::header::AUTHORIZATION;
use http::{Method, Request, Version};

use crate::error::Error;
use crate::token::ApnToken;

/// Widgets pushes address a dedicated sub-topic of the bundle id.
pub(crate) const WIDGETS_TOPIC_SUFFIX: &str = ".push-type.widgets";

/// APNs-defined category of a notification; the server routes and throttles
/// by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushType {
	Alert,
	Background,
	Widgets,
}

impl PushType {
	/// The `apns-push-type` header value.
	pub fn as_str(&self) -> &'static str {
		match self {
			PushType::Alert => "alert",
			PushType::Background => "background",
			PushType::Widgets => "widgets",
		}
	}

	/// Priority applied when the caller does not pick one. Widgets pushes
	/// carry no priority header at all unless the caller insists.
	pub fn default_priority(&self) -> Option<Priority> {
		match self {
			PushType::Alert => Some(Priority::Immediate),
			PushType::Background => Some(Priority::PowerEfficient),
			PushType::Widgets => None,
		}
	}
}

/// Delivery priority, as defined by APNs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Priority {
	Immediate = 10,
	PowerEfficient = 5,
	Low = 1,
}

impl Priority {
	/// The `apns-priority` header value.
	pub fn as_str(&self) -> &'static str {
		match self {
			Priority::Immediate => "10",
			Priority::PowerEfficient => "5",
			Priority::Low => "1",
		}
	}
}

/// The topic actually sent on the wire for the given push type.
pub fn wire_topic(topic: &str, push_type: PushType) -> Cow<'_, str> {
	match push_type {
		PushType::Widgets => Cow::Owned(format!("{topic}{WIDGETS_TOPIC_SUFFIX}")),
		_ => Cow::Borrowed(topic),
	}
}

/// Builds the request head for one notification. Pure; the body travels
/// separately as DATA frames.
///
/// An explicit `priority` wins over the push-type default; when both are
/// absent the header is omitted entirely.
pub fn build_request(
	hostname: &str,
	topic: &str,
	token: &ApnToken,
	push_type: PushType,
	priority: Option<Priority>,
	jwt: Option<&str>,
) -> Result<Request<()>, Error> {
	let topic = wire_topic(topic, push_type);
	let priority = priority.or_else(|| push_type.default_priority());

	let mut builder = Request::builder()
		.method(Method::POST)
		.version(Version::HTTP_2)
		.uri(format!("https://{hostname}/3/device/{}", token.as_hex()))
		.header("apns-topic", topic.as_ref())
		.header("apns-push-type", push_type.as_str());
	if let Some(priority) = priority {
		builder = builder.header("apns-priority", priority.as_str());
	}
	if let Some(jwt) = jwt {
		builder = builder.header(AUTHORIZATION, format!("bearer {jwt}"));
	}
	Ok(builder.body(())?)
}
