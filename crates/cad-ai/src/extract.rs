//! Pulls a geometry script out of free-form model output.

use once_cell::sync::Lazy;
use regex::Regex;

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:[\w+-]*[ \t]*\r?\n)?(.*?)```").expect("Invalid fenced block regex")
});
static FENCE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*```[\w+-]*[ \t]*$\n?").expect("Invalid fence regex"));
static BLANK_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("Invalid blank line regex"));

const CODE_MARKERS: &[&str] = &[
    "=",
    "circle(",
    "square(",
    "polygon(",
    "cube(",
    "sphere(",
    "cylinder(",
    "cone(",
    "torus(",
    ".extrude(",
    ".revolve(",
    ".move(",
    ".rotate(",
    ".polar(",
    "use ",
];

const PROSE_WORDS: &[&str] = &[
    "create", "generate", "make", "build", "will", "should", "can", "must", "the", "this", "that",
    "these",
];

const CODE_PUNCTUATION: &[char] = &['=', '(', ')', '[', ']', '{', '}'];

/// Tries a fenced block, then the line heuristic, then the raw text.
/// The result is cleaned; an empty string means nothing was found.
pub fn extract_script(response: &str) -> String {
    if response.trim().is_empty() {
        return String::new();
    }
    if let Some(block) = FENCED_BLOCK.captures(response).and_then(|c| c.get(1)) {
        return clean_script(block.as_str());
    }
    if let Some(lines) = code_lines(response) {
        return clean_script(&lines);
    }
    clean_script(response)
}

/// Normalizes line endings, collapses blank runs and strips stray fences.
pub fn clean_script(script: &str) -> String {
    let normalized = script.replace("\r\n", "\n").replace('\r', "\n");
    let unfenced = FENCE_LINE.replace_all(&normalized, "");
    let collapsed = BLANK_RUNS.replace_all(&unfenced, "\n\n");
    collapsed.trim().to_string()
}

fn code_lines(response: &str) -> Option<String> {
    let mut collected = Vec::new();
    let mut in_code = false;

    for line in response.lines() {
        let stripped = line.trim();
        if stripped.is_empty() {
            if in_code {
                collected.push(line);
            }
            continue;
        }

        let prose = looks_like_prose(stripped);
        if looks_like_code(stripped) && !prose {
            in_code = true;
            collected.push(line);
        } else if in_code && prose {
            break;
        } else if in_code {
            collected.push(line);
        }
    }

    if collected.is_empty() {
        None
    } else {
        Some(collected.join("\n"))
    }
}

fn looks_like_code(line: &str) -> bool {
    line.starts_with("//") || CODE_MARKERS.iter().any(|marker| line.contains(marker))
}

fn looks_like_prose(line: &str) -> bool {
    let lowered = line.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    words.len() > 5
        && words.iter().any(|word| PROSE_WORDS.contains(word))
        && !line.contains(CODE_PUNCTUATION)
        && !line.starts_with("//")
}

#[cfg(test)]
mod tests {
    use super::{clean_script, extract_script};

    #[test]
    fn fenced_block_wins_with_any_language_tag() {
        let response = "Here you go:\n```cad\nuse cad\nmodel = sphere(r=8)\n```\nEnjoy!";
        assert_eq!(extract_script(response), "use cad\nmodel = sphere(r=8)");

        let untagged = "```\nuse cad\nmodel = cube(10)\n```";
        assert_eq!(extract_script(untagged), "use cad\nmodel = cube(10)");
    }

    #[test]
    fn first_fenced_block_is_taken() {
        let response = "```\nuse cad\nmodel = cube(1)\n```\nor\n```\nuse cad\nmodel = cube(2)\n```";
        assert_eq!(extract_script(response), "use cad\nmodel = cube(1)");
    }

    #[test]
    fn line_heuristic_stops_at_trailing_prose() {
        let response = "Sure.\nuse cad\n// ring\nouter = circle(r=10)\n\nmodel = (outer - circle(r=5)).extrude(5)\nThis will create the ring that you asked for today.";
        assert_eq!(
            extract_script(response),
            "use cad\n// ring\nouter = circle(r=10)\n\nmodel = (outer - circle(r=5)).extrude(5)"
        );
    }

    #[test]
    fn raw_text_is_the_last_resort() {
        assert_eq!(extract_script("   just words   "), "just words");
        assert_eq!(extract_script("  \n\t "), "");
    }

    #[test]
    fn cleaning_normalizes_whitespace_and_fences() {
        let dirty = "```cad\r\nuse cad\r\n\r\n\r\n\r\nmodel = cube(2)\r\n```\n";
        assert_eq!(clean_script(dirty), "use cad\n\nmodel = cube(2)");
    }
}
