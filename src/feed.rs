use crate::error::{AurasafeError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostKind {
    Warning,
    Safe,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityPost {
    pub id: String,
    pub kind: PostKind,
    pub message: String,
    pub location: String,
    pub timestamp: DateTime<Utc>,
    pub anonymous: bool,
    pub author: Option<String>,
    pub verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPost {
    pub kind: PostKind,
    pub message: String,
    pub location: String,
    #[serde(default = "default_anonymous")]
    pub anonymous: bool,
}

fn default_anonymous() -> bool {
    true
}

/// Community safety posts, newest first
#[derive(Debug, Clone)]
pub struct CommunityFeed {
    posts: Vec<CommunityPost>,
}

impl CommunityFeed {
    pub fn seeded(now: DateTime<Utc>) -> Self {
        let seed = [
            (
                "1",
                PostKind::Warning,
                "Poorly lit area near 5th Street subway entrance. Multiple women reported feeling uncomfortable here after 8 PM.",
                "5th Street Station",
                30,
                None,
                true,
            ),
            (
                "2",
                PostKind::Safe,
                "Central Park security increased patrol frequency. Feeling much safer during evening jogs!",
                "Central Park",
                60,
                Some("Sarah M."),
                true,
            ),
            (
                "3",
                PostKind::Info,
                "New emergency call box installed near the university library. Great safety improvement!",
                "University District",
                120,
                Some("Jessica L."),
                false,
            ),
        ];

        let posts = seed
            .into_iter()
            .map(
                |(id, kind, message, location, age_minutes, author, verified)| CommunityPost {
                    id: id.to_string(),
                    kind,
                    message: message.to_string(),
                    location: location.to_string(),
                    timestamp: now - Duration::minutes(age_minutes),
                    anonymous: author.is_none(),
                    author: author.map(str::to_string),
                    verified,
                },
            )
            .collect();

        Self { posts }
    }

    pub fn posts(&self) -> &[CommunityPost] {
        &self.posts
    }

    /// Share a post. Message and location are both required.
    pub fn submit(&mut self, new: NewPost, now: DateTime<Utc>) -> Result<CommunityPost> {
        if new.message.trim().is_empty() {
            return Err(AurasafeError::validation("message", "is required"));
        }
        if new.location.trim().is_empty() {
            return Err(AurasafeError::validation("location", "is required"));
        }

        let post = CommunityPost {
            id: Uuid::new_v4().to_string(),
            kind: new.kind,
            message: new.message,
            location: new.location,
            timestamp: now,
            anonymous: new.anonymous,
            author: (!new.anonymous).then(|| "You".to_string()),
            verified: false,
        };

        info!("Community post shared for {}", post.location);
        self.posts.insert(0, post.clone());
        Ok(post)
    }
}

/// `"{m}m ago"` under an hour, `"{h}h ago"` under a day, the date otherwise
pub fn format_time_ago(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = (now - timestamp).max(Duration::zero());
    if elapsed < Duration::hours(1) {
        format!("{}m ago", elapsed.num_minutes())
    } else if elapsed < Duration::days(1) {
        format!("{}h ago", elapsed.num_hours())
    } else {
        timestamp.format("%Y-%m-%d").to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Danger,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyAlert {
    pub id: u32,
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
    pub location: Option<String>,
    pub time: String,
    pub read: bool,
}

#[derive(Debug, Clone)]
pub struct AlertInbox {
    alerts: Vec<SafetyAlert>,
}

impl AlertInbox {
    pub fn seeded() -> Self {
        Self {
            alerts: vec![
                SafetyAlert {
                    id: 1,
                    kind: AlertKind::Danger,
                    title: "High Crime Area Alert".to_string(),
                    message:
                        "Multiple incidents reported in your current area. Consider using alternate route."
                            .to_string(),
                    location: Some("Downtown District".to_string()),
                    time: "2 minutes ago".to_string(),
                    read: false,
                },
                SafetyAlert {
                    id: 2,
                    kind: AlertKind::Warning,
                    title: "Trust Network Check-in".to_string(),
                    message: "Sarah is requesting your location for safety check-in.".to_string(),
                    location: None,
                    time: "15 minutes ago".to_string(),
                    read: false,
                },
                SafetyAlert {
                    id: 3,
                    kind: AlertKind::Info,
                    title: "Safe Route Available".to_string(),
                    message:
                        "AI found a safer alternate route to your destination with better lighting."
                            .to_string(),
                    location: None,
                    time: "1 hour ago".to_string(),
                    read: true,
                },
            ],
        }
    }

    pub fn alerts(&self) -> &[SafetyAlert] {
        &self.alerts
    }

    pub fn mark_read(&mut self, id: u32) -> bool {
        match self.alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.read = true;
                true
            }
            None => false,
        }
    }

    pub fn dismiss(&mut self, id: u32) -> bool {
        let before = self.alerts.len();
        self.alerts.retain(|a| a.id != id);
        self.alerts.len() != before
    }

    pub fn unread_count(&self) -> usize {
        self.alerts.iter().filter(|a| !a.read).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_format_time_ago() {
        let now = noon();
        assert_eq!(format_time_ago(now, now), "0m ago");
        assert_eq!(format_time_ago(now - Duration::minutes(59), now), "59m ago");
        assert_eq!(format_time_ago(now - Duration::minutes(60), now), "1h ago");
        assert_eq!(format_time_ago(now - Duration::hours(23), now), "23h ago");
        assert_eq!(format_time_ago(now - Duration::hours(30), now), "2024-05-09");
    }

    #[test]
    fn test_seeded_feed_ages() {
        let now = noon();
        let feed = CommunityFeed::seeded(now);
        let ages: Vec<String> = feed
            .posts()
            .iter()
            .map(|p| format_time_ago(p.timestamp, now))
            .collect();
        assert_eq!(ages, vec!["30m ago", "1h ago", "2h ago"]);
        assert!(feed.posts()[0].anonymous);
    }

    #[test]
    fn test_submit_prepends_and_validates() {
        let mut feed = CommunityFeed::seeded(noon());
        let missing_location = NewPost {
            kind: PostKind::Warning,
            message: "Broken street light".to_string(),
            location: " ".to_string(),
            anonymous: false,
        };
        assert!(feed.submit(missing_location, noon()).is_err());

        let post = feed
            .submit(
                NewPost {
                    kind: PostKind::Warning,
                    message: "Broken street light".to_string(),
                    location: "Elm Street".to_string(),
                    anonymous: false,
                },
                noon(),
            )
            .unwrap();

        assert_eq!(post.author.as_deref(), Some("You"));
        assert!(!post.verified);
        assert_eq!(feed.posts().len(), 4);
        assert_eq!(feed.posts()[0].id, post.id);
    }

    #[test]
    fn test_alert_inbox() {
        let mut inbox = AlertInbox::seeded();
        assert_eq!(inbox.unread_count(), 2);

        assert!(inbox.mark_read(1));
        assert_eq!(inbox.unread_count(), 1);

        assert!(inbox.dismiss(2));
        assert!(!inbox.dismiss(2));
        assert!(!inbox.mark_read(42));
        assert_eq!(inbox.unread_count(), 0);
        assert_eq!(inbox.alerts().len(), 2);
    }
}
