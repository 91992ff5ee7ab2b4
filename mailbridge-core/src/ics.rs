//! Calendar document normalization.
//!
//! Documents cross the bridge as raw text and are stored verbatim, so
//! everything here works at the line level and preserves the document's
//! original bytes apart from the two edits storage needs:
//!
//! - dropping `METHOD:` lines (a mail-transport annotation that a
//!   storage-only import must not see)
//! - guaranteeing a `UID:` field, synthesizing one when absent

use uuid::Uuid;

fn starts_with_ignore_case(line: &str, prefix: &str) -> bool {
    line.len() >= prefix.len()
        && line.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// The document's dominant line terminator, used for injected lines.
fn line_terminator(doc: &str) -> &'static str {
    if doc.contains("\r\n") { "\r\n" } else { "\n" }
}

/// Remove every `METHOD:` line (case-insensitive, line-anchored) together
/// with its terminator. All other bytes are preserved verbatim.
pub fn strip_method(doc: &str) -> String {
    doc.split_inclusive('\n')
        .filter(|line| !starts_with_ignore_case(line, "METHOD:"))
        .collect()
}

/// Extract the first `UID:` field value (case-insensitive, line-anchored).
pub fn extract_uid(doc: &str) -> Option<String> {
    doc.lines()
        .find(|line| starts_with_ignore_case(line, "UID:"))
        .map(|line| line["UID:".len()..].trim().to_string())
        .filter(|uid| !uid.is_empty())
}

/// Return the document with a guaranteed `UID:` field, plus that uid.
///
/// When the document has no UID, a fresh v4 UUID is inserted directly after
/// the first `BEGIN:VEVENT` line, matching the document's line terminator.
/// A document with no event-start marker is returned unchanged.
pub fn ensure_uid(doc: &str) -> (String, String) {
    if let Some(uid) = extract_uid(doc) {
        return (doc.to_string(), uid);
    }

    let uid = Uuid::new_v4().to_string();
    let eol = line_terminator(doc);
    let mut out = String::with_capacity(doc.len() + uid.len() + 8);
    let mut inserted = false;

    for line in doc.split_inclusive('\n') {
        out.push_str(line);
        if !inserted && line.trim_end_matches(['\r', '\n']).eq_ignore_ascii_case("BEGIN:VEVENT") {
            if !line.ends_with('\n') {
                out.push_str(eol);
            }
            out.push_str("UID:");
            out.push_str(&uid);
            out.push_str(eol);
            inserted = true;
        }
    }

    (out, uid)
}

/// Full storage normalization: strip `METHOD:` lines, then guarantee a UID.
///
/// The order matters: UID extraction must never see transport lines.
pub fn normalize(doc: &str) -> (String, String) {
    ensure_uid(&strip_method(doc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use icalendar::parser::{read_calendar, unfold};

    const WITH_METHOD: &str = "BEGIN:VCALENDAR\r\nMETHOD:REQUEST\r\nBEGIN:VEVENT\r\nUID:evt-1\r\nSUMMARY:Standup\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";

    #[test]
    fn method_line_is_removed_with_its_terminator() {
        let cleaned = strip_method(WITH_METHOD);
        assert!(!cleaned.contains("METHOD"));
        assert!(cleaned.starts_with("BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\n"));
    }

    #[test]
    fn method_stripping_is_case_insensitive_and_line_anchored() {
        let doc = "method:CANCEL\nDESCRIPTION:the METHOD:REQUEST marker\nEND:VCALENDAR\n";
        let cleaned = strip_method(doc);
        assert_eq!(
            cleaned,
            "DESCRIPTION:the METHOD:REQUEST marker\nEND:VCALENDAR\n"
        );
    }

    #[test]
    fn uid_extraction_ignores_case_and_trims() {
        assert_eq!(
            extract_uid("BEGIN:VEVENT\nuid:  abc-123 \nEND:VEVENT\n").as_deref(),
            Some("abc-123")
        );
        assert_eq!(extract_uid("BEGIN:VEVENT\nEND:VEVENT\n"), None);
        // empty value counts as absent
        assert_eq!(extract_uid("UID:\nEND:VEVENT\n"), None);
    }

    #[test]
    fn existing_uid_leaves_document_untouched() {
        let (doc, uid) = ensure_uid(WITH_METHOD);
        assert_eq!(doc, WITH_METHOD);
        assert_eq!(uid, "evt-1");
    }

    #[test]
    fn missing_uid_is_synthesized_after_the_event_start_marker() {
        let doc = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nSUMMARY:Lunch\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        let (rewritten, uid) = ensure_uid(doc);

        let expected_line = format!("BEGIN:VEVENT\r\nUID:{uid}\r\n");
        assert!(rewritten.contains(&expected_line));
        assert_eq!(extract_uid(&rewritten).as_deref(), Some(uid.as_str()));
        // v4-style uid
        assert_eq!(uid.len(), 36);
    }

    #[test]
    fn synthesized_lines_match_lf_documents() {
        let doc = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nSUMMARY:Lunch\nEND:VEVENT\nEND:VCALENDAR\n";
        let (rewritten, uid) = ensure_uid(doc);
        assert!(rewritten.contains(&format!("BEGIN:VEVENT\nUID:{uid}\n")));
        assert!(!rewritten.contains('\r'));
    }

    #[test]
    fn normalize_strips_method_before_extracting_uid() {
        let (doc, uid) = normalize(WITH_METHOD);
        assert_eq!(uid, "evt-1");
        assert!(!doc.contains("METHOD"));
    }

    #[test]
    fn normalized_output_still_parses_as_a_calendar() {
        let (doc, uid) = normalize(
            "BEGIN:VCALENDAR\r\nMETHOD:REQUEST\r\nBEGIN:VEVENT\r\nDTSTART:20260301T100000Z\r\nDTEND:20260301T110000Z\r\nSUMMARY:Review\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n",
        );
        let unfolded = unfold(&doc);
        let calendar = read_calendar(&unfolded).expect("normalized doc should parse");
        let vevent = calendar
            .components
            .iter()
            .find(|c| c.name == "VEVENT")
            .expect("VEVENT survives normalization");
        assert_eq!(vevent.find_prop("UID").unwrap().val.to_string(), uid);
    }
}
