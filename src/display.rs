use std::io::Write;

use anyhow::Result;
use owo_colors::OwoColorize;

use crate::types::*;

const STATE_COLUMN_WIDTH: usize = 20;
const APPROVAL_COLUMN_WIDTH: usize = 40;
const STATUS_INDENT: &str = "    ";
const STATUS_URL_INDENT: &str = "        ";

/// Semantic colouring of report text, independent of the terminal library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Good,
    Best,
    Caution,
    Alert,
}

/// Styles `text` for `tone`, or returns it unchanged when `color` is off.
pub fn paint(text: &str, tone: Tone, color: bool) -> String {
    if !color {
        return text.to_string();
    }
    match tone {
        Tone::Info => text.bright_blue().to_string(),
        Tone::Good => text.green().to_string(),
        Tone::Best => text.bright_green().to_string(),
        Tone::Caution => text.yellow().to_string(),
        Tone::Alert => text.red().to_string(),
    }
}

/// Merge state shown in the first column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateLabel {
    Blocked,
    Ready,
    Draft,
    Unstable,
    Merged,
    Closed,
    Other(String),
}

impl StateLabel {
    pub fn as_str(&self) -> &str {
        match self {
            StateLabel::Blocked => "blocked",
            StateLabel::Ready => "ready",
            StateLabel::Draft => "draft",
            StateLabel::Unstable => "unstable",
            StateLabel::Merged => "merged",
            StateLabel::Closed => "closed",
            StateLabel::Other(raw) => raw,
        }
    }

    pub fn tone(&self) -> Tone {
        match self {
            StateLabel::Blocked => Tone::Info,
            StateLabel::Ready => Tone::Good,
            StateLabel::Merged => Tone::Best,
            StateLabel::Draft => Tone::Caution,
            StateLabel::Unstable | StateLabel::Closed | StateLabel::Other(_) => Tone::Alert,
        }
    }
}

pub fn state_label(pr: &PullDetails) -> StateLabel {
    match pr.state {
        PullState::Open => match pr.mergeable_state.as_deref() {
            Some("blocked") => StateLabel::Blocked,
            Some("clean") => StateLabel::Ready,
            Some("draft") => StateLabel::Draft,
            Some("unstable") => StateLabel::Unstable,
            Some(other) => StateLabel::Other(other.to_string()),
            None => StateLabel::Other("unknown".to_string()),
        },
        PullState::Closed if pr.merged => StateLabel::Merged,
        PullState::Closed => StateLabel::Closed,
    }
}

/// Login of the first reviewer to approve, in review order.
pub fn find_approver(reviews: &[Review]) -> Option<&str> {
    reviews
        .iter()
        .find(|review| review.verdict == ReviewVerdict::Approved)
        .map(|review| review.reviewer.as_str())
}

fn approval_text(reviews: &[Review]) -> (String, Tone) {
    match find_approver(reviews) {
        Some(approver) => (format!("approved by {approver}"), Tone::Good),
        None => ("needs approval".to_string(), Tone::Caution),
    }
}

pub fn failing_statuses(statuses: &[Status]) -> impl Iterator<Item = &Status> {
    statuses.iter().filter(|status| status.state.is_failing())
}

/// True when the pull request needs someone's attention.
pub fn is_finding(pull: &Pull) -> bool {
    !matches!(state_label(&pull.pr), StateLabel::Ready | StateLabel::Merged)
        || find_approver(&pull.reviews).is_none()
        || failing_statuses(&pull.statuses).next().is_some()
}

/// Orders pulls by canonical API URL.
pub fn sorted_pulls(pulls: &[Pull]) -> Vec<&Pull> {
    let mut sorted: Vec<&Pull> = pulls.iter().collect();
    sorted.sort_by(|a, b| a.pr.url.cmp(&b.pr.url));
    sorted
}

/// Fits `text` into a column of `width`, keeping at least one space before the
/// next column. Padding stays outside the colour codes.
fn column(text: &str, width: usize, tone: Tone, color: bool) -> String {
    let fitted: String = text.chars().take(width.saturating_sub(1)).collect();
    let padding = width - fitted.chars().count();
    format!("{}{}", paint(&fitted, tone, color), " ".repeat(padding))
}

fn render_pull<W: Write>(pull: &Pull, color: bool, writer: &mut W) -> Result<()> {
    let label = state_label(&pull.pr);
    let (approval, approval_tone) = approval_text(&pull.reviews);

    writeln!(
        writer,
        "{}{}{}",
        column(label.as_str(), STATE_COLUMN_WIDTH, label.tone(), color),
        column(&approval, APPROVAL_COLUMN_WIDTH, approval_tone, color),
        pull.pr.html_url
    )?;

    for status in failing_statuses(&pull.statuses) {
        let summary = format!(
            "{}: {}",
            status.context,
            status.description.as_deref().unwrap_or_default()
        );
        writeln!(writer, "{STATUS_INDENT}{}", paint(&summary, Tone::Alert, color))?;
        writeln!(
            writer,
            "{STATUS_URL_INDENT}{}",
            status.target_url.as_deref().unwrap_or_default()
        )?;
    }

    Ok(())
}

/// Writes the full report: summary lines, then one line per pull request in
/// URL order with its failing statuses underneath.
pub fn display_report<W: Write>(result: &QueryResult, color: bool, writer: &mut W) -> Result<()> {
    writeln!(writer, "Found {} pull requests", result.pulls.len())?;
    writeln!(
        writer,
        "Made {} API calls to {}.",
        result.api_calls, result.api_host
    )?;

    for pull in sorted_pulls(&result.pulls) {
        render_pull(pull, color, writer)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_repo() -> Repo {
        Repo::new("owner", "repo").unwrap()
    }

    fn details(number: u64, state: PullState, merged: bool, mergeable: Option<&str>) -> PullDetails {
        PullDetails {
            number,
            url: format!("https://api.github.com/repos/owner/repo/pulls/{number}"),
            html_url: format!("https://github.com/owner/repo/pull/{number}"),
            state,
            merged,
            mergeable_state: mergeable.map(str::to_string),
            head_sha: format!("sha{number}"),
            base_repo: test_repo(),
            statuses_url: Some(format!(
                "https://api.github.com/repos/owner/repo/statuses/sha{number}"
            )),
        }
    }

    fn review(id: u64, reviewer: &str, state: &str) -> Review {
        Review {
            id,
            reviewer: reviewer.to_string(),
            verdict: ReviewVerdict::from_api(state),
        }
    }

    fn status(context: &str, state: &str, description: &str) -> Status {
        Status {
            context: context.to_string(),
            state: StatusState::from_api(state),
            description: Some(description.to_string()),
            target_url: Some(format!("https://ci.example.com/{context}")),
        }
    }

    fn pull(pr: PullDetails, reviews: Vec<Review>, statuses: Vec<Status>) -> Pull {
        Pull {
            pr,
            reviews,
            statuses,
            api_calls: 3,
        }
    }

    fn render(result: &QueryResult, color: bool) -> String {
        let mut output = Vec::new();
        display_report(result, color, &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_state_label_mapping_is_total() {
        let cases = [
            ("blocked", "blocked"),
            ("clean", "ready"),
            ("draft", "draft"),
            ("unstable", "unstable"),
            ("something-else", "something-else"),
        ];
        for (mergeable, expected) in cases {
            let pr = details(1, PullState::Open, false, Some(mergeable));
            assert_eq!(state_label(&pr).as_str(), expected);
        }

        let merged = details(1, PullState::Closed, true, Some("clean"));
        assert_eq!(state_label(&merged), StateLabel::Merged);

        let closed = details(1, PullState::Closed, false, Some("clean"));
        assert_eq!(state_label(&closed), StateLabel::Closed);

        let uncomputed = details(1, PullState::Open, false, None);
        assert_eq!(state_label(&uncomputed).as_str(), "unknown");
    }

    #[test]
    fn test_state_label_tones() {
        assert_eq!(StateLabel::Blocked.tone(), Tone::Info);
        assert_eq!(StateLabel::Ready.tone(), Tone::Good);
        assert_eq!(StateLabel::Merged.tone(), Tone::Best);
        assert_eq!(StateLabel::Draft.tone(), Tone::Caution);
        assert_eq!(StateLabel::Unstable.tone(), Tone::Alert);
        assert_eq!(StateLabel::Closed.tone(), Tone::Alert);
        assert_eq!(StateLabel::Other("dirty".to_string()).tone(), Tone::Alert);
    }

    #[test]
    fn test_first_approver_wins() {
        let reviews = vec![
            review(1, "a", "COMMENTED"),
            review(2, "b", "APPROVED"),
            review(3, "c", "APPROVED"),
        ];
        assert_eq!(find_approver(&reviews), Some("b"));
        assert_eq!(approval_text(&reviews).0, "approved by b");
    }

    #[test]
    fn test_needs_approval_without_approved_review() {
        let reviews = vec![review(1, "a", "COMMENTED")];
        assert_eq!(find_approver(&reviews), None);
        assert_eq!(
            approval_text(&reviews),
            ("needs approval".to_string(), Tone::Caution)
        );
    }

    #[test]
    fn test_only_failing_statuses_get_sub_lines() {
        let result = QueryResult {
            pulls: vec![pull(
                details(1, PullState::Open, false, Some("unstable")),
                vec![],
                vec![
                    status("lint", "success", "ok"),
                    status("deploy", "pending", "waiting"),
                    status("ci", "failure", "build broke"),
                ],
            )],
            api_calls: 4,
            api_host: "github.com".to_string(),
        };

        let output = render(&result, false);
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 5);
        assert_eq!(lines[3], "    ci: build broke");
        assert_eq!(lines[4], "        https://ci.example.com/ci");
        assert!(!output.contains("lint"));
        assert!(!output.contains("deploy"));
    }

    #[test]
    fn test_report_layout_without_color() {
        let result = QueryResult {
            pulls: vec![pull(
                details(7, PullState::Open, false, Some("blocked")),
                vec![review(1, "alice", "APPROVED")],
                vec![],
            )],
            api_calls: 4,
            api_host: "github.com".to_string(),
        };

        let expected = concat!(
            "Found 1 pull requests\n",
            "Made 4 API calls to github.com.\n",
            "blocked             approved by alice                       https://github.com/owner/repo/pull/7\n",
        );
        assert_eq!(render(&result, false), expected);
    }

    #[test]
    fn test_report_lines_sorted_by_api_url() {
        let result = QueryResult {
            pulls: vec![
                pull(details(9, PullState::Open, false, Some("clean")), vec![], vec![]),
                pull(details(10, PullState::Closed, true, None), vec![], vec![]),
                pull(details(2, PullState::Closed, false, None), vec![], vec![]),
            ],
            api_calls: 10,
            api_host: "github.com".to_string(),
        };

        let output = render(&result, false);
        let urls: Vec<&str> = output
            .lines()
            .skip(2)
            .map(|line| line.rsplit(' ').next().unwrap())
            .collect();

        // String order, so pull 10 sorts before pull 2 and 9.
        assert_eq!(
            urls,
            vec![
                "https://github.com/owner/repo/pull/10",
                "https://github.com/owner/repo/pull/2",
                "https://github.com/owner/repo/pull/9",
            ]
        );
    }

    #[test]
    fn test_report_is_idempotent() {
        let result = QueryResult {
            pulls: vec![
                pull(
                    details(3, PullState::Open, false, Some("draft")),
                    vec![review(1, "bob", "CHANGES_REQUESTED")],
                    vec![status("ci", "error", "infra")],
                ),
                pull(details(1, PullState::Open, false, Some("clean")), vec![], vec![]),
            ],
            api_calls: 7,
            api_host: "github.com".to_string(),
        };

        assert_eq!(render(&result, true), render(&result, true));
        assert_eq!(render(&result, false), render(&result, false));
    }

    #[test]
    fn test_colored_output_keeps_column_alignment() {
        let pr = pull(
            details(5, PullState::Closed, true, None),
            vec![review(1, "carol", "APPROVED")],
            vec![],
        );

        let mut plain = Vec::new();
        render_pull(&pr, false, &mut plain).unwrap();
        let mut colored = Vec::new();
        render_pull(&pr, true, &mut colored).unwrap();

        let colored = String::from_utf8(colored).unwrap();
        assert!(colored.contains(&"merged".bright_green().to_string()));
        assert!(colored.contains(&"approved by carol".green().to_string()));
        assert_ne!(String::from_utf8(plain.clone()).unwrap(), colored);

        let stripped = colored
            .replace(&"merged".bright_green().to_string(), "merged")
            .replace(&"approved by carol".green().to_string(), "approved by carol");
        assert_eq!(String::from_utf8(plain).unwrap(), stripped);
    }

    #[test]
    fn test_column_truncates_long_text() {
        let login = "a".repeat(60);
        let text = format!("approved by {login}");
        let fitted = column(&text, APPROVAL_COLUMN_WIDTH, Tone::Good, false);
        assert_eq!(fitted.chars().count(), APPROVAL_COLUMN_WIDTH);
        assert!(fitted.ends_with(' '));
        assert!(fitted.starts_with("approved by aaa"));
    }

    #[test]
    fn test_paint_without_color_is_identity() {
        for tone in [Tone::Info, Tone::Good, Tone::Best, Tone::Caution, Tone::Alert] {
            assert_eq!(paint("text", tone, false), "text");
        }
        assert_eq!(paint("x", Tone::Alert, true), "x".red().to_string());
    }

    #[test]
    fn test_findings() {
        let clean = pull(
            details(1, PullState::Open, false, Some("clean")),
            vec![review(1, "a", "APPROVED")],
            vec![status("ci", "success", "ok")],
        );
        assert!(!is_finding(&clean));

        let unapproved = pull(
            details(2, PullState::Open, false, Some("clean")),
            vec![],
            vec![],
        );
        assert!(is_finding(&unapproved));

        let failing = pull(
            details(3, PullState::Closed, true, None),
            vec![review(1, "a", "APPROVED")],
            vec![status("ci", "failure", "broke")],
        );
        assert!(is_finding(&failing));

        let blocked = pull(
            details(4, PullState::Open, false, Some("blocked")),
            vec![review(1, "a", "APPROVED")],
            vec![],
        );
        assert!(is_finding(&blocked));
    }
}
