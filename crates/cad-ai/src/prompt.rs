pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a CAD generator that outputs valid geometry scripts for 3D printing.

Script format:
- First line: use cad
- Statements are `name = expression`, one per line (a trailing `;` is allowed).
- The final solid must be bound to a variable named `model`.
- Comments start with `//`.
- Numbers may carry an `mm` suffix. Angles are in degrees.

2D profile catalog (centered on the origin):
- circle(r, fn?) - fn > 0 makes a regular polygon with fn sides
- square(w, h?) - rectangle, h defaults to w
- polygon([[x, y], ...]) - custom outline

3D solid catalog (centered on the origin):
- cube(x, y?, z?)
- sphere(r)
- cylinder(h, r)
- cone(h, r1, r2)
- torus(R, r)

Profile operations:
- .extrude(h, scale?) - profile to solid spanning z from 0 to h, scale tapers the top
- .revolve() - spin the profile (x = radius, y = height) around the Z axis
- .move(x, y), .rotate(deg), .scale(s), .offset(d), .polar(n)

Solid operations:
- .move(x, y, z), .rotate(x, y, z), .scale(s), .mirror(x, y, z), .polar(n)

Boolean operators:
- a + b (union), a - b (difference), a & b (intersection)
- union(a, b, ...), difference(a, b, ...), intersection(a, b, ...)
- Both operands must be profiles or both must be solids.

Math helpers:
- sin cos tan sqrt abs min max floor ceil radians degrees pi

Constraints:
- Output only the script, no explanations.
- There are no loops, functions or imports other than `use cad`.
- Dimensions are in millimeters.
- Favor watertight, printable solids with positive volume.
"#;

/// A worked prompt/script pair shown to the model before the user prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FewShotExample {
    pub prompt: &'static str,
    pub script: &'static str,
}

pub const FEW_SHOT_EXAMPLES: &[FewShotExample] = &[
    FewShotExample {
        prompt: "Create a cross shape",
        script: "use cad\n// Cross shape\nplus = square(30, 10) + square(10, 30)\nmodel = plus.extrude(5)",
    },
    FewShotExample {
        prompt: "Create a simple cone",
        script: "use cad\n// Simple cone\nbase_radius = 10\nheight = 15\nmodel = cone(h=height, r1=base_radius, r2=0)",
    },
    FewShotExample {
        prompt: "Create a simple staircase with 3 steps",
        script: "use cad\n// Staircase with 3 steps\nstep_width = 30\nstep_depth = 20\nstep_height = 8\nstep1 = cube(step_width, step_depth, step_height).move(0, 0, step_height / 2)\nstep2 = cube(step_width, step_depth, step_height * 2).move(0, step_depth, step_height)\nstep3 = cube(step_width, step_depth, step_height * 3).move(0, step_depth * 2, step_height * 1.5)\nmodel = step1 + step2 + step3",
    },
    FewShotExample {
        prompt: "Create a washer or ring",
        script: "use cad\n// Washer\nouter_radius = 15\ninner_radius = 5\nthickness = 3\nring = circle(r=outer_radius) - circle(r=inner_radius)\nmodel = ring.extrude(thickness)",
    },
    FewShotExample {
        prompt: "Make a hexagonal nut",
        script: "use cad\n// Hexagonal nut\nhex_width = 20\nthickness = 10\nhole_diameter = 12\nnut = circle(r=hex_width / 2, fn=6).extrude(thickness)\nhole = circle(r=hole_diameter / 2).extrude(thickness)\nmodel = nut - hole",
    },
    FewShotExample {
        prompt: "Create a vase",
        script: "use cad\n// Vase from a revolved wall profile\nwall = square(2, 40).move(12, 20)\nbase = cylinder(h=2, r=13).move(0, 0, 1)\nmodel = wall.revolve() + base",
    },
];

/// Wraps the caller's prompt the way the examples are phrased.
pub fn user_message(prompt: &str) -> String {
    format!("Create a 3D model for: \"{}\"", prompt.trim())
}

#[cfg(test)]
mod tests {
    use cad_script::{RESULT_VARIABLE, ResultLookup, SandboxLimits, run_script, validate_script};

    use super::{DEFAULT_SYSTEM_PROMPT, FEW_SHOT_EXAMPLES, user_message};

    #[test]
    fn system_prompt_includes_required_components() {
        for section in [
            "Script format:",
            "2D profile catalog",
            "3D solid catalog",
            "Profile operations:",
            "Solid operations:",
            "Boolean operators:",
            "Math helpers:",
            "Constraints:",
            "use cad",
            "`model`",
        ] {
            assert!(
                DEFAULT_SYSTEM_PROMPT.contains(section),
                "missing section {section}"
            );
        }
    }

    #[test]
    fn every_example_is_a_runnable_script() {
        for example in FEW_SHOT_EXAMPLES {
            assert_eq!(validate_script(example.script), Ok(()), "{}", example.prompt);
            let evaluation = run_script(example.script, &SandboxLimits::default())
                .unwrap_or_else(|err| panic!("{} failed: {err}", example.prompt));
            assert!(
                matches!(
                    evaluation.lookup_result(RESULT_VARIABLE),
                    ResultLookup::Bound(_)
                ),
                "{} does not bind a solid",
                example.prompt
            );
        }
    }

    #[test]
    fn user_message_quotes_prompt() {
        assert_eq!(
            user_message("  a small gear "),
            "Create a 3D model for: \"a small gear\""
        );
    }
}
