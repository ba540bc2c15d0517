use chrono::{DateTime, Utc};
use shared::models::RequestEnvelope;

#[derive(Debug, Clone, Default)]
pub struct RequestVerification {
    /// When set, requests for any other skill are refused.
    pub skill_id: Option<String>,
    /// Maximum allowed clock distance for the request timestamp. Zero disables the check.
    pub timestamp_tolerance_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum VerificationFailure {
    SkillIdMismatch,
    MissingTimestamp,
    StaleTimestamp { age_seconds: i64 },
}

impl RequestVerification {
    pub(super) fn verify(
        &self,
        envelope: &RequestEnvelope,
        now: DateTime<Utc>,
    ) -> Result<(), VerificationFailure> {
        if let Some(expected) = self.skill_id.as_deref()
            && envelope.application_id() != Some(expected)
        {
            return Err(VerificationFailure::SkillIdMismatch);
        }

        if self.timestamp_tolerance_seconds == 0 {
            return Ok(());
        }

        let timestamp = envelope
            .request
            .timestamp
            .ok_or(VerificationFailure::MissingTimestamp)?;
        let age_seconds = (now - timestamp).num_seconds();
        let tolerance = i64::try_from(self.timestamp_tolerance_seconds).unwrap_or(i64::MAX);
        if age_seconds.abs() > tolerance {
            return Err(VerificationFailure::StaleTimestamp { age_seconds });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;
    use shared::models::RequestEnvelope;

    use super::{RequestVerification, VerificationFailure};

    fn envelope(application_id: &str, timestamp: Option<&str>) -> RequestEnvelope {
        let mut request = json!({ "type": "LaunchRequest" });
        if let Some(timestamp) = timestamp {
            request["timestamp"] = json!(timestamp);
        }
        serde_json::from_value(json!({
            "session": { "application": { "applicationId": application_id } },
            "request": request
        }))
        .expect("fixture envelope should decode")
    }

    #[test]
    fn accepts_matching_skill_within_tolerance() {
        let now = Utc
            .with_ymd_and_hms(2026, 10, 17, 9, 30, 0)
            .single()
            .expect("valid utc datetime");
        let verification = RequestVerification {
            skill_id: Some("skill-a".to_string()),
            timestamp_tolerance_seconds: 150,
        };

        let fresh = envelope("skill-a", Some("2026-10-17T09:28:00Z"));
        assert_eq!(verification.verify(&fresh, now), Ok(()));
    }

    #[test]
    fn rejects_other_skills() {
        let verification = RequestVerification {
            skill_id: Some("skill-a".to_string()),
            timestamp_tolerance_seconds: 0,
        };

        let foreign = envelope("skill-b", None);
        assert_eq!(
            verification.verify(&foreign, Utc::now()),
            Err(VerificationFailure::SkillIdMismatch)
        );
    }

    #[test]
    fn rejects_stale_or_missing_timestamps_when_enabled() {
        let now = Utc
            .with_ymd_and_hms(2026, 10, 17, 9, 30, 0)
            .single()
            .expect("valid utc datetime");
        let verification = RequestVerification {
            skill_id: None,
            timestamp_tolerance_seconds: 150,
        };

        let stale_at = (now - Duration::seconds(151)).to_rfc3339();
        assert_eq!(
            verification.verify(&envelope("any", Some(&stale_at)), now),
            Err(VerificationFailure::StaleTimestamp { age_seconds: 151 })
        );
        assert_eq!(
            verification.verify(&envelope("any", None), now),
            Err(VerificationFailure::MissingTimestamp)
        );
    }

    #[test]
    fn disabled_tolerance_ignores_timestamps() {
        let verification = RequestVerification::default();
        assert_eq!(
            verification.verify(&envelope("any", None), Utc::now()),
            Ok(())
        );
    }
}
