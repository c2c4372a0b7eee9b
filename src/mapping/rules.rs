//! Static taxonomy rule tables.
//!
//! The two systems name activity and milestone types differently; these
//! tables carry the agreed-on translations. Lookups are first-match-wins
//! against normalized keys, so "EBR", "ebr" and "E.B.R." all land on the
//! same row. Rows map source names to *canonical* names; the canonical
//! names are then matched against the target's live category lists.

use crate::util::normalize_key;

/// (source type name, canonical activity type, canonical subtype).
pub const ACTIVITY_TYPE_RULES: &[(&str, &str, &str)] = &[
    // Meetings
    ("EBR", "Meeting", "EBR"),
    ("Executive Business Review", "Meeting", "EBR"),
    ("QBR", "Meeting", "QBR"),
    ("Quarterly Business Review", "Meeting", "QBR"),
    ("Business Review", "Meeting", "QBR"),
    ("Kickoff", "Meeting", "Kickoff"),
    ("Kick-off", "Meeting", "Kickoff"),
    ("Onboarding Session", "Meeting", "Kickoff"),
    ("Training", "Meeting", "Training"),
    ("Workshop", "Meeting", "Training"),
    ("Enablement", "Meeting", "Training"),
    ("Check-in", "Meeting", "Check-in"),
    ("Sync", "Meeting", "Check-in"),
    ("On-site", "Meeting", "On-site"),
    ("Onsite Visit", "Meeting", "On-site"),
    ("Meeting", "Meeting", "General"),
    // Calls
    ("Call", "Call", "Phone Call"),
    ("Phone Call", "Call", "Phone Call"),
    ("Voicemail", "Call", "Voicemail"),
    // Email threads copied into the timeline
    ("Email", "Email", "Email"),
    ("Email Thread", "Email", "Email"),
    // Plain updates
    ("Note", "Update", "Note"),
    ("Update", "Update", "Note"),
    ("Internal Note", "Update", "Note"),
    ("Escalation", "Update", "Escalation"),
    ("Risk Update", "Update", "Escalation"),
];

/// Canonical {type, subtype} for a source activity type name, if any rule
/// matches. First match wins.
pub fn canonical_activity_type(source_name: &str) -> Option<(&'static str, &'static str)> {
    let key = normalize_key(source_name);
    if key.is_empty() {
        return None;
    }
    ACTIVITY_TYPE_RULES
        .iter()
        .find(|(name, _, _)| normalize_key(name) == key)
        .map(|(_, type_name, subtype)| (*type_name, *subtype))
}

/// (source milestone label, target milestone label).
pub const MILESTONE_LABEL_RULES: &[(&str, &str)] = &[
    ("Kickoff", "Kickoff"),
    ("Kick-off", "Kickoff"),
    ("Onboarding Started", "Kickoff"),
    ("Go Live", "Go-Live"),
    ("Go-Live", "Go-Live"),
    ("Launch", "Go-Live"),
    ("Onboarding Complete", "Onboarding Complete"),
    ("Adoption", "Adoption Review"),
    ("Adoption Review", "Adoption Review"),
    ("Renewal", "Renewal"),
    ("Renewed", "Renewal"),
    ("Expansion", "Expansion"),
    ("Upsell", "Expansion"),
    ("Churn", "Churned"),
    ("Churned", "Churned"),
    ("Risk Identified", "At Risk"),
    ("At Risk", "At Risk"),
];

/// Target-side milestone label for a source label, if a rule matches.
pub fn target_milestone_label(source_label: &str) -> Option<&'static str> {
    let key = normalize_key(source_label);
    if key.is_empty() {
        return None;
    }
    MILESTONE_LABEL_RULES
        .iter()
        .find(|(source, _)| normalize_key(source) == key)
        .map(|(_, target)| *target)
}
