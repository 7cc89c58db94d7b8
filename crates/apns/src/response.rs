use http::StatusCode;
use serde::Deserialize;

use crate::error::Error;

/// Outcome of one send, as reported by APNs or the local stack. Transport
/// and protocol failures are folded in at the session boundary; callers
/// never see a raw error.
#[derive(Debug)]
pub enum ApnResult {
	/// The notification was accepted.
	Ok,
	/// The local stream limit refused the request before it went out; retry
	/// later.
	Backoff,
	/// APNs rejected the notification permanently.
	Fatal(FatalReason),
	/// APNs reported a transient failure.
	Temporary(TemporaryReason),
	/// The socket failed underneath the session.
	IoError(std::io::Error),
	/// The local stack failed: protocol error, closed session or connection,
	/// timeout, undecodable response.
	ClientError(Error),
}

impl ApnResult {
	/// True only for an accepted notification.
	pub fn is_ok(&self) -> bool {
		matches!(self, ApnResult::Ok)
	}
}

impl From<Error> for ApnResult {
	fn from(e: Error) -> ApnResult {
		match e {
			Error::Io(e) => ApnResult::IoError(e),
			Error::Http2(e) if e.is_io() => {
				ApnResult::IoError(e.into_io().expect("checked is_io"))
			},
			e => ApnResult::ClientError(e),
		}
	}
}

/// Permanent rejection reasons, spelled the way APNs sends them. A reason
/// string outside the known set is preserved in `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FatalReason {
	BadCollapseId,
	BadDeviceToken,
	BadExpirationDate,
	BadMessageId,
	BadPriority,
	BadTopic,
	DeviceTokenNotForTopic,
	DuplicateHeaders,
	IdleTimeout,
	MissingDeviceToken,
	MissingTopic,
	PayloadEmpty,
	TopicDisallowed,
	BadCertificate,
	BadCertificateEnvironment,
	ExpiredProviderToken,
	Forbidden,
	InvalidProviderToken,
	MissingProviderToken,
	BadPath,
	MethodNotAllowed,
	Unregistered,
	PayloadTooLarge,
	Other(String),
}

impl From<&str> for FatalReason {
	fn from(reason: &str) -> FatalReason {
		match reason {
			"BadCollapseId" => FatalReason::BadCollapseId,
			"BadDeviceToken" => FatalReason::BadDeviceToken,
			"BadExpirationDate" => FatalReason::BadExpirationDate,
			"BadMessageId" => FatalReason::BadMessageId,
			"BadPriority" => FatalReason::BadPriority,
			"BadTopic" => FatalReason::BadTopic,
			"DeviceTokenNotForTopic" => FatalReason::DeviceTokenNotForTopic,
			"DuplicateHeaders" => FatalReason::DuplicateHeaders,
			"IdleTimeout" => FatalReason::IdleTimeout,
			"MissingDeviceToken" => FatalReason::MissingDeviceToken,
			"MissingTopic" => FatalReason::MissingTopic,
			"PayloadEmpty" => FatalReason::PayloadEmpty,
			"TopicDisallowed" => FatalReason::TopicDisallowed,
			"BadCertificate" => FatalReason::BadCertificate,
			"BadCertificateEnvironment" => FatalReason::BadCertificateEnvironment,
			"ExpiredProviderToken" => FatalReason::ExpiredProviderToken,
			"Forbidden" => FatalReason::Forbidden,
			"InvalidProviderToken" => FatalReason::InvalidProviderToken,
			"MissingProviderToken" => FatalReason::MissingProviderToken,
			"BadPath" => FatalReason::BadPath,
			"MethodNotAllowed" => FatalReason::MethodNotAllowed,
			"Unregistered" => FatalReason::Unregistered,
			"PayloadTooLarge" => FatalReason::PayloadTooLarge,
			other => FatalReason::Other(other.to_string()),
		}
	}
}

/// Transient rejection reasons. Deliberately no wildcard: an unknown reason
/// at a transient status is a protocol error, not a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TemporaryReason {
	TooManyProviderTokenUpdates,
	TooManyRequests,
	InternalServerError,
	ServiceUnavailable,
	Shutdown,
}

#[derive(Deserialize)]
struct ReasonBody {
	reason: String,
}

fn reason(body: &[u8]) -> Result<String, Error> {
	let body: ReasonBody = serde_json::from_slice(body)?;
	Ok(body.reason)
}

/// Maps an APNs response to the result taxonomy.
///
/// 200 is the only success. 400/403/405/410/413 are permanent, with an open
/// fallback for unknown reason strings; 429/500/503 are transient, with
/// none. Any other status is permanent with the code preserved.
pub(crate) fn classify(status: StatusCode, body: &[u8]) -> Result<ApnResult, Error> {
	match status.as_u16() {
		200 => Ok(ApnResult::Ok),
		400 | 403 | 405 | 410 | 413 => {
			let reason = reason(body)?;
			Ok(ApnResult::Fatal(FatalReason::from(reason.as_str())))
		},
		429 | 500 | 503 => {
			let reason = reason(body)?;
			let reason = serde_json::from_value(serde_json::Value::String(reason))?;
			Ok(ApnResult::Temporary(reason))
		},
		code => Ok(ApnResult::Fatal(FatalReason::Other(format!(
			"unhandled status: {code}"
		)))),
	}
}

#[cfg(test)]
mod test {
	use test_case::test_case;

	use super::*;

	fn classify_code(code: u16, body: &str) -> Result<ApnResult, Error> {
		classify(StatusCode::from_u16(code).unwrap(), body.as_bytes())
	}

	#[test]
	fn accepted() {
		assert!(classify_code(200, "").unwrap().is_ok());
	}

	#[test_case(400, "BadCollapseId", FatalReason::BadCollapseId; "bad collapse id")]
	#[test_case(400, "BadDeviceToken", FatalReason::BadDeviceToken; "bad device token")]
	#[test_case(400, "BadExpirationDate", FatalReason::BadExpirationDate; "bad expiration date")]
	#[test_case(400, "BadMessageId", FatalReason::BadMessageId; "bad message id")]
	#[test_case(400, "BadPriority", FatalReason::BadPriority; "bad priority")]
	#[test_case(400, "BadTopic", FatalReason::BadTopic; "bad topic")]
	#[test_case(400, "DeviceTokenNotForTopic", FatalReason::DeviceTokenNotForTopic; "token not for topic")]
	#[test_case(400, "DuplicateHeaders", FatalReason::DuplicateHeaders; "duplicate headers")]
	#[test_case(400, "IdleTimeout", FatalReason::IdleTimeout; "idle timeout")]
	#[test_case(400, "MissingDeviceToken", FatalReason::MissingDeviceToken; "missing device token")]
	#[test_case(400, "MissingTopic", FatalReason::MissingTopic; "missing topic")]
	#[test_case(400, "PayloadEmpty", FatalReason::PayloadEmpty; "payload empty")]
	#[test_case(400, "TopicDisallowed", FatalReason::TopicDisallowed; "topic disallowed")]
	#[test_case(403, "BadCertificate", FatalReason::BadCertificate; "bad certificate")]
	#[test_case(403, "BadCertificateEnvironment", FatalReason::BadCertificateEnvironment; "bad certificate environment")]
	#[test_case(403, "ExpiredProviderToken", FatalReason::ExpiredProviderToken; "expired provider token")]
	#[test_case(403, "Forbidden", FatalReason::Forbidden; "forbidden")]
	#[test_case(403, "InvalidProviderToken", FatalReason::InvalidProviderToken; "invalid provider token")]
	#[test_case(403, "MissingProviderToken", FatalReason::MissingProviderToken; "missing provider token")]
	#[test_case(400, "BadPath", FatalReason::BadPath; "bad path")]
	#[test_case(405, "MethodNotAllowed", FatalReason::MethodNotAllowed; "method not allowed")]
	#[test_case(410, "Unregistered", FatalReason::Unregistered; "unregistered")]
	#[test_case(413, "PayloadTooLarge", FatalReason::PayloadTooLarge; "payload too large")]
	fn fatal_reasons(code: u16, reason: &str, expected: FatalReason) {
		let body = format!(r#"{{"reason":"{reason}"}}"#);
		match classify_code(code, &body).unwrap() {
			ApnResult::Fatal(got) => assert_eq!(got, expected),
			other => panic!("expected fatal, got {other:?}"),
		}
	}

	#[test]
	fn fatal_reason_matching_is_case_sensitive() {
		match classify_code(400, r#"{"reason":"BadcollapseId"}"#).unwrap() {
			ApnResult::Fatal(got) => {
				assert_eq!(got, FatalReason::Other("BadcollapseId".to_string()))
			},
			other => panic!("expected fatal, got {other:?}"),
		}
	}

	#[test_case(429, "TooManyProviderTokenUpdates", TemporaryReason::TooManyProviderTokenUpdates; "too many provider token updates")]
	#[test_case(429, "TooManyRequests", TemporaryReason::TooManyRequests; "too many requests")]
	#[test_case(500, "InternalServerError", TemporaryReason::InternalServerError; "internal server error")]
	#[test_case(503, "ServiceUnavailable", TemporaryReason::ServiceUnavailable; "service unavailable")]
	#[test_case(503, "Shutdown", TemporaryReason::Shutdown; "shutdown")]
	fn temporary_reasons(code: u16, reason: &str, expected: TemporaryReason) {
		let body = format!(r#"{{"reason":"{reason}"}}"#);
		match classify_code(code, &body).unwrap() {
			ApnResult::Temporary(got) => assert_eq!(got, expected),
			other => panic!("expected temporary, got {other:?}"),
		}
	}

	#[test]
	fn unknown_temporary_reason_is_a_protocol_error() {
		let res = classify_code(503, r#"{"reason":"HeatDeath"}"#);
		assert!(matches!(res, Err(Error::Json(_))));
	}

	#[test]
	fn unhandled_status_is_fatal_other() {
		match classify_code(418, "").unwrap() {
			ApnResult::Fatal(FatalReason::Other(text)) => {
				assert_eq!(text, "unhandled status: 418")
			},
			other => panic!("expected fatal other, got {other:?}"),
		}
	}

	#[test]
	fn undecodable_body_is_a_client_error() {
		assert!(matches!(
			classify_code(400, "not json"),
			Err(Error::Json(_))
		));
		assert!(matches!(
			classify_code(429, r#"{"nope":1}"#),
			Err(Error::Json(_))
		));
	}

	#[test]
	fn io_errors_fold_to_io_results() {
		let e = Error::Io(std::io::Error::other("boom"));
		assert!(matches!(ApnResult::from(e), ApnResult::IoError(_)));
		let e = Error::SessionClosed;
		assert!(matches!(
			ApnResult::from(e),
			ApnResult::ClientError(Error::SessionClosed)
		));
	}
}
