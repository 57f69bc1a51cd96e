//! First Blood announcement content.

use chrono::{DateTime, Utc};

use crate::platform::Notice;

use super::Solver;

pub const ANNOUNCEMENT_TITLE: &str = "🩸 First Blood! 🩸";
pub const ANNOUNCEMENT_FOOTER: &str = "CTFd First Blood Alert";

const DEFAULT_COLOR: u32 = 0x72_89_DA;

/// Embed color for a challenge category (case-insensitive).
pub fn category_color(category: &str) -> u32 {
    match category.trim().to_lowercase().as_str() {
        "web" => 0x34_98_DB,
        "pwn" => 0xE7_4C_3C,
        "crypto" => 0x2E_CC_71,
        "rev" => 0x9B_59_B6,
        "forensics" => 0x34_49_5E,
        "misc" => 0xF3_9C_12,
        _ => DEFAULT_COLOR,
    }
}

/// A detected first solve, ready to post.
#[derive(Debug, Clone, PartialEq)]
pub struct FirstBloodAnnouncement {
    pub challenge_id: u64,
    pub challenge_name: String,
    pub category: String,
    pub points: i64,
    pub solver: Solver,
    pub solved_at: DateTime<Utc>,
}

impl FirstBloodAnnouncement {
    pub fn solver_display(&self) -> String {
        self.solver.display()
    }

    pub fn notice(&self, now: DateTime<Utc>) -> Notice {
        Notice::new(
            ANNOUNCEMENT_TITLE,
            format!(
                "**{}** was the first to solve **{}**!",
                self.solver_display(),
                self.challenge_name
            ),
            category_color(&self.category),
        )
        .field("📁 Category", self.category.to_uppercase(), true)
        .field("🏆 Points", format!("{} pts", self.points), true)
        .field(
            "⏱️ Solved at",
            self.solved_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            true,
        )
        .footer(ANNOUNCEMENT_FOOTER)
        .timestamp(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_category_colors() {
        assert_eq!(category_color("web"), 0x3498db);
        assert_eq!(category_color("PWN"), 0xe74c3c);
        assert_eq!(category_color("Forensics"), 0x34495e);
        assert_eq!(category_color("blockchain"), 0x7289da);
    }

    #[test]
    fn test_notice_fields() {
        let solved_at = Utc.with_ymd_and_hms(2024, 5, 4, 10, 20, 30).unwrap();
        let announcement = FirstBloodAnnouncement {
            challenge_id: 1,
            challenge_name: "babyweb".to_string(),
            category: "web".to_string(),
            points: 100,
            solver: Solver::new("alice", Some("RedTeam".to_string())),
            solved_at,
        };

        let notice = announcement.notice(solved_at);
        assert_eq!(notice.title, "🩸 First Blood! 🩸");
        assert!(notice.description.contains("**alice (RedTeam)**"));
        assert!(notice.description.contains("**babyweb**"));
        assert_eq!(notice.color, 0x3498db);
        assert_eq!(notice.fields[0].value, "WEB");
        assert_eq!(notice.fields[1].value, "100 pts");
        assert_eq!(notice.fields[2].value, "2024-05-04 10:20:30");
        assert_eq!(notice.footer.as_deref(), Some("CTFd First Blood Alert"));
    }
}
