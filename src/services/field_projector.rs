use crate::models::candidate::Candidate;

pub const PROFILE_FIELDS: [&str; 4] = ["fullName", "age", "phone", "email"];

/// Copies `value` onto the candidate profile field named by `field_key`.
/// Returns `false` (and leaves the candidate untouched) for keys outside the allow-list.
pub fn project_field(candidate: &mut Candidate, field_key: &str, value: &str) -> bool {
    let value = Some(value.trim().to_string());
    match field_key {
        "fullName" => candidate.full_name = value,
        "age" => candidate.age = value,
        "phone" => candidate.phone = value,
        "email" => candidate.email = value,
        other => {
            tracing::debug!(field_key = other, "ignoring unknown profile field key");
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::candidate::CandidateStatus;
    use chrono::Utc;
    use uuid::Uuid;

    fn candidate() -> Candidate {
        Candidate {
            id: Uuid::new_v4(),
            bot_id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
            channel_user_id: "1".into(),
            username: None,
            lang: "en".into(),
            status: CandidateStatus::Incomplete,
            current_step: 0,
            column_id: None,
            full_name: None,
            age: None,
            phone: None,
            email: None,
            last_answer_key: None,
            last_answer_step: None,
            last_activity: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn known_keys_are_projected() {
        let mut c = candidate();
        for key in PROFILE_FIELDS {
            assert!(project_field(&mut c, key, " value "));
        }
        assert_eq!(c.full_name.as_deref(), Some("value"));
        assert_eq!(c.age.as_deref(), Some("value"));
        assert_eq!(c.phone.as_deref(), Some("value"));
        assert_eq!(c.email.as_deref(), Some("value"));
    }

    #[test]
    fn unknown_key_is_ignored() {
        let mut c = candidate();
        let before = c.clone();
        assert!(!project_field(&mut c, "salary", "1000"));
        assert_eq!(c, before);
    }
}
