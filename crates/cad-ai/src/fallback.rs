//! Deterministic keyword-to-script table used when the model is
//! unavailable. Table order is the match priority.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackCategory {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    body: &'static str,
}

impl FallbackCategory {
    fn label(&self) -> String {
        let mut chars = self.name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// Full script for this category.
    pub fn script(&self) -> String {
        format!(
            "use cad\n// {} fallback (AI service temporarily unavailable)\n{}\n",
            self.label(),
            self.body
        )
    }
}

pub const FALLBACK_CATALOG: &[FallbackCategory] = &[
    FallbackCategory {
        name: "cone",
        keywords: &["cone", "triangle", "pyramid"],
        body: "model = circle(r=10).extrude(15, scale=0.05)",
    },
    FallbackCategory {
        name: "sphere",
        keywords: &["sphere", "ball", "round", "orb"],
        body: "model = sphere(r=8)",
    },
    FallbackCategory {
        name: "cylinder",
        keywords: &["cylinder", "tube", "pipe", "rod"],
        body: "model = cylinder(h=20, r=6)",
    },
    FallbackCategory {
        name: "ring",
        keywords: &["ring", "washer", "hole", "donut", "torus"],
        body: "ring = circle(r=10) - circle(r=5)\nmodel = ring.extrude(5)",
    },
    FallbackCategory {
        name: "gear",
        keywords: &["gear", "cog", "teeth", "sprocket"],
        body: "tooth = square(3, 2).move(13, 0)\nteeth = tooth.polar(12)\nbase = circle(r=12) - circle(r=8)\nmodel = (base + teeth).extrude(5)",
    },
    FallbackCategory {
        name: "star",
        keywords: &["star", "asterisk"],
        body: "outline = polygon([\n    [10, 0], [4.045, 2.939], [3.090, 9.511], [-1.545, 4.755], [-8.090, 5.878],\n    [-5, 0], [-8.090, -5.878], [-1.545, -4.755], [3.090, -9.511], [4.045, -2.939],\n])\nmodel = outline.extrude(3)",
    },
    FallbackCategory {
        name: "hexagon",
        keywords: &["hexagon", "hex", "nut", "bolt"],
        body: "model = circle(r=10, fn=6).extrude(5)",
    },
    FallbackCategory {
        name: "stairs",
        keywords: &["stairs", "staircase", "steps"],
        body: "step1 = cube(30, 20, 8).move(0, 0, 4)\nstep2 = cube(30, 20, 16).move(0, 19, 8)\nstep3 = cube(30, 20, 24).move(0, 38, 12)\nmodel = step1 + step2 + step3",
    },
    FallbackCategory {
        name: "cross",
        keywords: &["cross", "plus", "+"],
        body: "plus = square(30, 10) + square(10, 30)\nmodel = plus.extrude(5)",
    },
];

pub const DEFAULT_CATEGORY: FallbackCategory = FallbackCategory {
    name: "box",
    keywords: &[],
    body: "model = square(15, 15).extrude(8)",
};

/// First catalog entry with a keyword contained in the prompt, ignoring
/// case, or the box default.
pub fn matched_category(prompt: &str) -> &'static FallbackCategory {
    let lowered = prompt.to_lowercase();
    FALLBACK_CATALOG
        .iter()
        .find(|category| category.keywords.iter().any(|kw| lowered.contains(kw)))
        .unwrap_or(&DEFAULT_CATEGORY)
}

/// Always returns a script that passes validation.
pub fn synthesize(prompt: &str) -> String {
    matched_category(prompt).script()
}

#[cfg(test)]
mod tests {
    use cad_script::{RESULT_VARIABLE, ResultLookup, SandboxLimits, run_script, validate_script};
    use proptest::prelude::*;

    use super::{DEFAULT_CATEGORY, FALLBACK_CATALOG, matched_category, synthesize};

    #[test]
    fn keyword_priority_follows_table_order() {
        let cases = [
            ("a round ring", "sphere"),
            ("cone shaped gear", "cone"),
            ("a pipe with a hole", "cylinder"),
            ("gear teeth on a star", "gear"),
            ("STAR with a hex nut", "star"),
            ("hex bolt for stairs", "hexagon"),
            ("steps shaped like a cross", "stairs"),
            ("1 + 1", "cross"),
            ("a Washer", "ring"),
            ("something else entirely", "box"),
            ("", "box"),
        ];
        for (prompt, expected) in cases {
            assert_eq!(matched_category(prompt).name, expected, "prompt '{prompt}'");
        }
    }

    #[test]
    fn scripts_share_the_same_shape() {
        let script = synthesize("Create a ring");
        assert!(script.starts_with("use cad\n// Ring fallback (AI service temporarily unavailable)\n"));
        assert!(script.contains("circle(r=10) - circle(r=5)"));
        assert!(synthesize("anything").contains("// Box fallback"));
    }

    #[test]
    fn every_category_evaluates_to_a_solid() {
        for category in FALLBACK_CATALOG.iter().chain(std::iter::once(&DEFAULT_CATEGORY)) {
            let script = category.script();
            assert_eq!(validate_script(&script), Ok(()), "{}", category.name);
            let evaluation = run_script(&script, &SandboxLimits::default())
                .unwrap_or_else(|err| panic!("{} failed: {err}", category.name));
            assert!(
                matches!(
                    evaluation.lookup_result(RESULT_VARIABLE),
                    ResultLookup::Bound(_)
                ),
                "{} does not bind a solid",
                category.name
            );
        }
    }

    proptest! {
        #[test]
        fn synthesized_scripts_always_validate(prompt in ".*") {
            let script = synthesize(&prompt);
            prop_assert!(validate_script(&script).is_ok());
            prop_assert_eq!(script, synthesize(&prompt));
        }
    }
}
