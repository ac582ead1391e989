use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An extracurricular activity and its current participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub description: String,
    pub schedule: String,
    pub max_participants: usize,
    pub participants: Vec<String>,
}

impl Activity {
    pub fn new(
        description: impl Into<String>,
        schedule: impl Into<String>,
        max_participants: usize,
        participants: &[&str],
    ) -> Self {
        Self {
            description: description.into(),
            schedule: schedule.into(),
            max_participants,
            participants: participants.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() >= self.max_participants
    }
}

/// The school's starting roster.
pub fn seed_activities() -> BTreeMap<String, Activity> {
    let mut activities = BTreeMap::new();

    activities.insert(
        "Chess Club".to_string(),
        Activity::new(
            "Learn strategies and compete in chess tournaments",
            "Fridays, 3:30 PM - 5:00 PM",
            12,
            &["michael@mergington.edu", "daniel@mergington.edu"],
        ),
    );
    activities.insert(
        "Programming Class".to_string(),
        Activity::new(
            "Learn programming fundamentals and build software projects",
            "Tuesdays and Thursdays, 3:30 PM - 4:30 PM",
            20,
            &["emma@mergington.edu", "sophia@mergington.edu"],
        ),
    );
    activities.insert(
        "Gym Class".to_string(),
        Activity::new(
            "Physical education and sports activities",
            "Mondays, Wednesdays, Fridays, 2:00 PM - 3:00 PM",
            30,
            &["john@mergington.edu", "olivia@mergington.edu"],
        ),
    );
    activities.insert(
        "Soccer Team".to_string(),
        Activity::new(
            "Join the school soccer team and compete in matches",
            "Tuesdays and Thursdays, 4:00 PM - 5:30 PM",
            22,
            &["liam@mergington.edu", "noah@mergington.edu"],
        ),
    );
    activities.insert(
        "Basketball Team".to_string(),
        Activity::new(
            "Practice and play basketball with the school team",
            "Wednesdays and Fridays, 3:30 PM - 5:00 PM",
            15,
            &["ava@mergington.edu", "mia@mergington.edu"],
        ),
    );
    activities.insert(
        "Art Club".to_string(),
        Activity::new(
            "Explore your creativity through painting and drawing",
            "Thursdays, 3:30 PM - 5:00 PM",
            15,
            &["amelia@mergington.edu", "harper@mergington.edu"],
        ),
    );
    activities.insert(
        "Drama Club".to_string(),
        Activity::new(
            "Act, direct, and produce plays and performances",
            "Mondays and Wednesdays, 4:00 PM - 5:30 PM",
            20,
            &["ella@mergington.edu", "scarlett@mergington.edu"],
        ),
    );
    activities.insert(
        "Math Club".to_string(),
        Activity::new(
            "Solve challenging problems and participate in math competitions",
            "Tuesdays, 3:30 PM - 4:30 PM",
            10,
            &["james@mergington.edu", "benjamin@mergington.edu"],
        ),
    );
    activities.insert(
        "Debate Team".to_string(),
        Activity::new(
            "Develop public speaking and argumentation skills",
            "Fridays, 4:00 PM - 5:30 PM",
            12,
            &["charlotte@mergington.edu", "henry@mergington.edu"],
        ),
    );

    activities
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_activities() {
        let activities = seed_activities();
        assert!(activities.contains_key("Chess Club"));
        assert!(activities.contains_key("Debate Team"));

        let chess = &activities["Chess Club"];
        assert_eq!(chess.max_participants, 12);
        assert_eq!(chess.participants.len(), 2);
        assert!(!chess.is_full());
    }

    #[test]
    fn test_is_full() {
        let activity = Activity::new("desc", "schedule", 1, &["only@mergington.edu"]);
        assert!(activity.is_full());
    }
}
