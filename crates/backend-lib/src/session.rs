// ============================
// crates/backend-lib/src/session.rs
// ============================
//! Session lifecycle state machine.
//!
//! `pending -> active <-> paused -> ended`, with `ended` terminal.
use crate::error::AppError;
use chrono::{DateTime, Utc};
use livedeck_common::{SessionId, SessionStatus, SlideId};
use uuid::Uuid;

/// One live run of a presentation.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub presentation_id: Uuid,
    pub join_code: String,
    pub status: SessionStatus,
    /// Non-null only while `active` or `paused`.
    pub current_slide: Option<SlideId>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(presentation_id: Uuid, join_code: String) -> Self {
        Session {
            id: Uuid::new_v4(),
            presentation_id,
            join_code,
            status: SessionStatus::Pending,
            current_slide: None,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
        }
    }

    /// `pending -> active`. Sets `started_at` and points the session
    /// at the deck's first slide.
    pub fn start(&mut self, first_slide: Option<SlideId>) -> Result<(), AppError> {
        if self.status != SessionStatus::Pending {
            return Err(AppError::InvalidTransition {
                from: self.status,
                action: "start",
            });
        }
        self.status = SessionStatus::Active;
        self.started_at = Some(Utc::now());
        self.current_slide = first_slide;
        Ok(())
    }

    /// `active -> paused`.
    pub fn pause(&mut self) -> Result<(), AppError> {
        if self.status != SessionStatus::Active {
            return Err(AppError::InvalidTransition {
                from: self.status,
                action: "pause",
            });
        }
        self.status = SessionStatus::Paused;
        Ok(())
    }

    /// `paused -> active`.
    pub fn resume(&mut self) -> Result<(), AppError> {
        if self.status != SessionStatus::Paused {
            return Err(AppError::InvalidTransition {
                from: self.status,
                action: "resume",
            });
        }
        self.status = SessionStatus::Active;
        Ok(())
    }

    /// Any non-ended state -> `ended`. Clears the slide pointer so
    /// the current-slide invariant holds in the terminal state.
    pub fn end(&mut self) -> Result<DateTime<Utc>, AppError> {
        if self.status == SessionStatus::Ended {
            return Err(AppError::InvalidTransition {
                from: self.status,
                action: "end",
            });
        }
        let ended_at = Utc::now();
        self.status = SessionStatus::Ended;
        self.ended_at = Some(ended_at);
        self.current_slide = None;
        Ok(ended_at)
    }

    /// Move the current-slide pointer. Only valid while `active` or
    /// `paused`.
    pub fn set_current_slide(&mut self, slide_id: SlideId) -> Result<(), AppError> {
        match self.status {
            SessionStatus::Active | SessionStatus::Paused => {
                self.current_slide = Some(slide_id);
                Ok(())
            },
            status => Err(AppError::InvalidTransition {
                from: status,
                action: "change slide",
            }),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    pub fn is_ended(&self) -> bool {
        self.status == SessionStatus::Ended
    }

    /// Seconds from start to end (or to now for a running session).
    pub fn duration_seconds(&self) -> Option<u64> {
        let started = self.started_at?;
        let until = self.ended_at.unwrap_or_else(Utc::now);
        Some((until - started).num_seconds().max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(Uuid::new_v4(), "ABC234".to_string())
    }

    #[test]
    fn test_full_lifecycle() {
        let mut s = session();
        assert_eq!(s.status, SessionStatus::Pending);
        assert!(s.current_slide.is_none());

        let first = Uuid::new_v4();
        s.start(Some(first)).unwrap();
        assert_eq!(s.status, SessionStatus::Active);
        assert_eq!(s.current_slide, Some(first));
        assert!(s.started_at.is_some());

        s.pause().unwrap();
        assert_eq!(s.status, SessionStatus::Paused);
        s.resume().unwrap();
        assert_eq!(s.status, SessionStatus::Active);

        s.end().unwrap();
        assert_eq!(s.status, SessionStatus::Ended);
        assert!(s.ended_at.is_some());
        assert!(s.current_slide.is_none());
    }

    #[test]
    fn test_start_twice_rejected() {
        let mut s = session();
        s.start(None).unwrap();
        let err = s.start(None).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[test]
    fn test_pause_from_pending_rejected() {
        let mut s = session();
        assert!(matches!(
            s.pause(),
            Err(AppError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_resume_from_active_rejected() {
        let mut s = session();
        s.start(None).unwrap();
        assert!(matches!(
            s.resume(),
            Err(AppError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_set_slide_while_pending_rejected() {
        let mut s = session();
        let err = s.set_current_slide(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[test]
    fn test_set_slide_while_paused_allowed() {
        let mut s = session();
        s.start(None).unwrap();
        s.pause().unwrap();
        let slide = Uuid::new_v4();
        s.set_current_slide(slide).unwrap();
        assert_eq!(s.current_slide, Some(slide));
    }

    #[test]
    fn test_end_is_terminal() {
        let mut s = session();
        s.start(None).unwrap();
        s.end().unwrap();
        assert!(matches!(s.end(), Err(AppError::InvalidTransition { .. })));
        assert!(matches!(
            s.set_current_slide(Uuid::new_v4()),
            Err(AppError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_end_from_pending_allowed() {
        let mut s = session();
        s.end().unwrap();
        assert!(s.is_ended());
    }
}
