use std::f64::consts::PI;

use cad_core::{Axis, GeometryError, Point2, Profile, Solid};

use crate::ast::{Arg, BinaryOp, Expr, Item, Program, Statement, UnaryOp};
use crate::{ENGINE_MODULE, MATH_MODULE, ScriptError, parse_program};

/// Resource bounds applied to a single script evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SandboxLimits {
    pub max_statements: usize,
    /// Weighted count of geometry nodes in any single shape. Polar arrays
    /// count their child once per copy.
    pub max_nodes: usize,
    /// Deepest shape tree any value may reach.
    pub max_depth: usize,
    pub max_list_len: usize,
    pub max_polar_count: usize,
    /// Largest allowed bounding-box extent of the exported model, in mm.
    pub max_extent: f64,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            max_statements: 1_000,
            max_nodes: 5_000,
            max_depth: 200,
            max_list_len: 1_024,
            max_polar_count: 360,
            max_extent: 10_000.0,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    List(Vec<Value>),
    Profile(Profile),
    Solid(Solid),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::List(_) => "list",
            Value::Profile(_) => "2D profile",
            Value::Solid(_) => "3D solid",
        }
    }

    pub fn as_solid(&self) -> Option<&Solid> {
        match self {
            Value::Solid(solid) => Some(solid),
            _ => None,
        }
    }
}

/// Top-level bindings left behind by a script, in first-binding order.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    bindings: Vec<(String, Value)>,
}

/// Outcome of looking up the exported object.
#[derive(Debug)]
pub enum ResultLookup<'a> {
    /// The result variable holds a 3D solid.
    Bound(&'a Solid),
    /// The result variable is unbound; the first solid binding stands in.
    Substituted { name: &'a str, solid: &'a Solid },
    /// The result variable holds something that cannot be exported.
    NotExportable { kind: &'static str },
    /// No exportable binding at all.
    Missing { available: Vec<String> },
}

impl Evaluation {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings
            .iter()
            .find(|(bound, _)| bound == name)
            .map(|(_, value)| value)
    }

    pub fn names(&self) -> Vec<String> {
        self.bindings.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn lookup_result(&self, name: &str) -> ResultLookup<'_> {
        match self.get(name) {
            Some(Value::Solid(solid)) => ResultLookup::Bound(solid),
            Some(other) => ResultLookup::NotExportable { kind: other.kind() },
            None => self
                .bindings
                .iter()
                .find_map(|(bound, value)| {
                    value.as_solid().map(|solid| ResultLookup::Substituted {
                        name: bound.as_str(),
                        solid,
                    })
                })
                .unwrap_or_else(|| ResultLookup::Missing {
                    available: self.names(),
                }),
        }
    }

    fn bind(&mut self, name: &str, value: Value) {
        match self.bindings.iter_mut().find(|(bound, _)| bound == name) {
            Some(slot) => slot.1 = value,
            None => self.bindings.push((name.to_string(), value)),
        }
    }
}

pub fn run_script(source: &str, limits: &SandboxLimits) -> Result<Evaluation, ScriptError> {
    let program = parse_program(source)?;
    evaluate(&program, limits)
}

/// Evaluates a parsed program. The only reachable capabilities are the
/// geometry engine (after `use cad`) and the math namespace.
pub fn evaluate(program: &Program, limits: &SandboxLimits) -> Result<Evaluation, ScriptError> {
    if program.statements.len() > limits.max_statements {
        return Err(ScriptError::new(format!(
            "script exceeds {} statements",
            limits.max_statements
        )));
    }

    let mut interpreter = Interpreter {
        limits,
        scope: Evaluation::default(),
        engine_enabled: false,
    };
    for statement in &program.statements {
        interpreter
            .execute(statement)
            .map_err(|err| err.or_at(statement.line, statement.column))?;
    }
    Ok(interpreter.scope)
}

const ENGINE_FUNCTIONS: &[&str] = &[
    "circle",
    "square",
    "polygon",
    "cube",
    "sphere",
    "cylinder",
    "cone",
    "torus",
    "union",
    "difference",
    "intersection",
];

const MATH_FUNCTIONS: &[&str] = &[
    "sin", "cos", "tan", "sqrt", "abs", "min", "max", "floor", "ceil", "radians", "degrees",
];

const PROFILE_METHODS: &[&str] = &[
    "extrude",
    "revolve",
    "move",
    "rotate",
    "scale",
    "offset",
    "polar",
    "union",
    "difference",
    "intersection",
];

const SOLID_METHODS: &[&str] = &[
    "move",
    "rotate",
    "scale",
    "mirror",
    "polar",
    "union",
    "difference",
    "intersection",
];

const MODULES: &[&str] = &[ENGINE_MODULE, MATH_MODULE];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetOp {
    Union,
    Difference,
    Intersection,
}

impl SetOp {
    fn verb(self) -> &'static str {
        match self {
            SetOp::Union => "union",
            SetOp::Difference => "subtract",
            SetOp::Intersection => "intersect",
        }
    }
}

type CallArgs = Vec<(Option<String>, Value)>;

struct Interpreter<'a> {
    limits: &'a SandboxLimits,
    scope: Evaluation,
    engine_enabled: bool,
}

impl Interpreter<'_> {
    fn execute(&mut self, statement: &Statement) -> Result<(), ScriptError> {
        match &statement.item {
            Item::Use(module) => self.import(module),
            Item::Assignment { name, expr } => {
                let value = self.eval(expr)?;
                self.scope.bind(name, value);
                Ok(())
            }
            Item::Expr(expr) => self.eval(expr).map(|_| ()),
        }
    }

    fn import(&mut self, module: &str) -> Result<(), ScriptError> {
        match module {
            ENGINE_MODULE => {
                self.engine_enabled = true;
                Ok(())
            }
            MATH_MODULE => Ok(()),
            other => Err(ScriptError::new(format!(
                "module '{other}' is not available in the sandbox{}",
                did_you_mean(other, MODULES)
            ))),
        }
    }

    fn eval(&self, expr: &Expr) -> Result<Value, ScriptError> {
        match expr {
            Expr::Number(value) => Ok(Value::Number(*value)),
            Expr::Variable(name) => self.lookup(name),
            Expr::List(items) => {
                if items.len() > self.limits.max_list_len {
                    return Err(ScriptError::new(format!(
                        "list exceeds {} elements",
                        self.limits.max_list_len
                    )));
                }
                let values = items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::List(values))
            }
            Expr::Unary {
                op: UnaryOp::Neg,
                expr,
            } => match self.eval(expr)? {
                Value::Number(value) => Ok(Value::Number(-value)),
                other => Err(ScriptError::new(format!("cannot negate a {}", other.kind()))),
            },
            Expr::Binary { lhs, op, rhs } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                let value = self.binary(*op, lhs, rhs)?;
                self.checked(value)
            }
            Expr::Call { name, args } => {
                let args = self.eval_args(args)?;
                let value = self.call_function(name, args)?;
                self.checked(value)
            }
            Expr::MethodCall {
                receiver,
                method,
                args,
            } => {
                let receiver = self.eval(receiver)?;
                let args = self.eval_args(args)?;
                let value = self.call_method(receiver, method, args)?;
                self.checked(value)
            }
        }
    }

    fn eval_args(&self, args: &[Arg]) -> Result<CallArgs, ScriptError> {
        args.iter()
            .map(|arg| Ok((arg.name.clone(), self.eval(&arg.value)?)))
            .collect()
    }

    fn lookup(&self, name: &str) -> Result<Value, ScriptError> {
        if let Some(value) = self.scope.get(name) {
            return Ok(value.clone());
        }
        if name == "pi" {
            return Ok(Value::Number(PI));
        }
        if ENGINE_FUNCTIONS.contains(&name) || MATH_FUNCTIONS.contains(&name) {
            return Err(ScriptError::new(format!(
                "'{name}' is a function; call it with parentheses"
            )));
        }

        let mut candidates: Vec<&str> = self.scope.bindings.iter().map(|(n, _)| n.as_str()).collect();
        candidates.push("pi");
        Err(ScriptError::new(format!(
            "unknown variable '{name}'{}",
            did_you_mean(name, &candidates)
        )))
    }

    /// Rejects shapes that outgrow the node or depth budget.
    fn checked(&self, value: Value) -> Result<Value, ScriptError> {
        let metrics = match &value {
            Value::Profile(profile) => profile_metrics(profile),
            Value::Solid(solid) => solid_metrics(solid),
            _ => return Ok(value),
        };
        if metrics.depth > self.limits.max_depth {
            return Err(ScriptError::new(format!(
                "model nesting exceeds {} levels",
                self.limits.max_depth
            )));
        }
        if metrics.cost > self.limits.max_nodes {
            return Err(ScriptError::new(format!(
                "model exceeds {} geometry nodes",
                self.limits.max_nodes
            )));
        }
        Ok(value)
    }

    fn binary(&self, op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, ScriptError> {
        match (op, lhs, rhs) {
            (_, Value::Number(a), Value::Number(b)) => arithmetic(op, a, b),
            (BinaryOp::Add, a, b) => combine(SetOp::Union, a, b),
            (BinaryOp::Sub, a, b) => combine(SetOp::Difference, a, b),
            (BinaryOp::And, a, b) => combine(SetOp::Intersection, a, b),
            (BinaryOp::Mul, shape, Value::Number(factor))
            | (BinaryOp::Mul, Value::Number(factor), shape)
                if is_shape(&shape) =>
            {
                scale_value(shape, factor)
            }
            (BinaryOp::Div, shape, Value::Number(divisor)) if is_shape(&shape) => {
                if divisor == 0.0 {
                    return Err(ScriptError::new("division by zero"));
                }
                scale_value(shape, 1.0 / divisor)
            }
            (op, a, b) => Err(ScriptError::new(format!(
                "unsupported operand types for {}: {} and {}",
                op.symbol(),
                a.kind(),
                b.kind()
            ))),
        }
    }

    fn call_function(&self, name: &str, mut args: CallArgs) -> Result<Value, ScriptError> {
        if ENGINE_FUNCTIONS.contains(&name) {
            if !self.engine_enabled {
                return Err(ScriptError::new(format!(
                    "'{name}' requires 'use {ENGINE_MODULE}'"
                )));
            }
            return self.call_engine(name, &mut args);
        }
        if MATH_FUNCTIONS.contains(&name) {
            return call_math(name, args);
        }

        let candidates: Vec<&str> = ENGINE_FUNCTIONS
            .iter()
            .chain(MATH_FUNCTIONS.iter())
            .copied()
            .collect();
        Err(ScriptError::new(format!(
            "unknown function '{name}'{}",
            did_you_mean(name, &candidates)
        )))
    }

    fn call_engine(&self, name: &str, args: &mut CallArgs) -> Result<Value, ScriptError> {
        match name {
            "circle" => {
                let bound = BoundArgs::bind(name, &["r", "fn"], 1, std::mem::take(args))?;
                let radius = bound.number(0)?;
                let profile = match bound.optional_count(1)? {
                    Some(sides) if sides > self.limits.max_list_len => {
                        return Err(ScriptError::new(format!(
                            "circle accepts at most {} segments, got {sides}",
                            self.limits.max_list_len
                        )));
                    }
                    Some(sides) => Profile::regular_polygon(sides, radius),
                    None => Profile::circle(radius),
                };
                profile.map(Value::Profile).map_err(geometry)
            }
            "square" => {
                expand_vector_arg(args);
                let bound = BoundArgs::bind(name, &["w", "h"], 1, std::mem::take(args))?;
                let width = bound.number(0)?;
                let height = bound.optional_number(1)?.unwrap_or(width);
                Profile::rect(width, height)
                    .map(Value::Profile)
                    .map_err(geometry)
            }
            "polygon" => {
                let mut bound = BoundArgs::bind(name, &["points"], 1, std::mem::take(args))?;
                let points = bound.points(0, self.limits.max_list_len)?;
                Profile::polygon(points)
                    .map(Value::Profile)
                    .map_err(geometry)
            }
            "cube" => {
                expand_vector_arg(args);
                let bound = BoundArgs::bind(name, &["x", "y", "z"], 1, std::mem::take(args))?;
                let x = bound.number(0)?;
                let y = bound.optional_number(1)?.unwrap_or(x);
                let z = bound.optional_number(2)?.unwrap_or(x);
                Solid::cuboid(x, y, z).map(Value::Solid).map_err(geometry)
            }
            "sphere" => {
                let bound = BoundArgs::bind(name, &["r"], 1, std::mem::take(args))?;
                Solid::sphere(bound.number(0)?)
                    .map(Value::Solid)
                    .map_err(geometry)
            }
            "cylinder" => {
                let bound = BoundArgs::bind(name, &["h", "r"], 2, std::mem::take(args))?;
                Solid::cylinder(bound.number(0)?, bound.number(1)?)
                    .map(Value::Solid)
                    .map_err(geometry)
            }
            "cone" => {
                let bound = BoundArgs::bind(name, &["h", "r1", "r2"], 3, std::mem::take(args))?;
                Solid::cone(bound.number(0)?, bound.number(1)?, bound.number(2)?)
                    .map(Value::Solid)
                    .map_err(geometry)
            }
            "torus" => {
                let bound = BoundArgs::bind(name, &["R", "r"], 2, std::mem::take(args))?;
                Solid::torus(bound.number(0)?, bound.number(1)?)
                    .map(Value::Solid)
                    .map_err(geometry)
            }
            "union" => fold_shapes(name, SetOp::Union, std::mem::take(args)),
            "difference" => fold_shapes(name, SetOp::Difference, std::mem::take(args)),
            "intersection" => fold_shapes(name, SetOp::Intersection, std::mem::take(args)),
            _ => Err(ScriptError::new(format!("unknown function '{name}'"))),
        }
    }

    fn call_method(
        &self,
        receiver: Value,
        method: &str,
        mut args: CallArgs,
    ) -> Result<Value, ScriptError> {
        match receiver {
            Value::Profile(profile) => self.profile_method(profile, method, args),
            Value::Solid(solid) => {
                if matches!(method, "move" | "rotate" | "mirror") {
                    expand_vector_arg(&mut args);
                }
                self.solid_method(solid, method, args)
            }
            other => Err(ScriptError::new(format!(
                "{} has no method '{method}'",
                other.kind()
            ))),
        }
    }

    fn profile_method(
        &self,
        profile: Profile,
        method: &str,
        mut args: CallArgs,
    ) -> Result<Value, ScriptError> {
        let callee = format!(".{method}");
        let result = match method {
            "extrude" => {
                let bound = BoundArgs::bind(&callee, &["h", "scale"], 1, args)?;
                let top_scale = bound.optional_number(1)?.unwrap_or(1.0);
                return Solid::extrude(profile, bound.number(0)?, top_scale)
                    .map(Value::Solid)
                    .map_err(geometry);
            }
            "revolve" => {
                BoundArgs::bind(&callee, &[], 0, args)?;
                return Ok(Value::Solid(Solid::revolve(profile)));
            }
            "move" => {
                expand_vector_arg(&mut args);
                let bound = BoundArgs::bind(&callee, &["x", "y"], 1, args)?;
                profile.translated(bound.number(0)?, bound.optional_number(1)?.unwrap_or(0.0))
            }
            "rotate" => {
                let bound = BoundArgs::bind(&callee, &["angle"], 1, args)?;
                profile.rotated(bound.number(0)?.to_radians())
            }
            "scale" => {
                let bound = BoundArgs::bind(&callee, &["s"], 1, args)?;
                profile.scaled(bound.number(0)?)
            }
            "offset" => {
                let bound = BoundArgs::bind(&callee, &["d"], 1, args)?;
                profile.offset(bound.number(0)?)
            }
            "polar" => {
                let bound = BoundArgs::bind(&callee, &["n"], 1, args)?;
                profile.polar(self.polar_count(&bound)?)
            }
            "union" => return fold_shapes(&callee, SetOp::Union, prepend(Value::Profile(profile), args)),
            "difference" => {
                return fold_shapes(&callee, SetOp::Difference, prepend(Value::Profile(profile), args));
            }
            "intersection" => {
                return fold_shapes(
                    &callee,
                    SetOp::Intersection,
                    prepend(Value::Profile(profile), args),
                );
            }
            _ => {
                return Err(ScriptError::new(format!(
                    "2D profile has no method '{method}'{}",
                    did_you_mean(method, PROFILE_METHODS)
                )));
            }
        };
        result.map(Value::Profile).map_err(geometry)
    }

    fn solid_method(&self, solid: Solid, method: &str, args: CallArgs) -> Result<Value, ScriptError> {
        let callee = format!(".{method}");
        let result = match method {
            "move" => {
                let bound = BoundArgs::bind(&callee, &["x", "y", "z"], 1, args)?;
                solid.translated([
                    bound.number(0)?,
                    bound.optional_number(1)?.unwrap_or(0.0),
                    bound.optional_number(2)?.unwrap_or(0.0),
                ])
            }
            "rotate" => {
                let bound = BoundArgs::bind(&callee, &["x", "y", "z"], 1, args)?;
                let angles = [
                    bound.number(0)?,
                    bound.optional_number(1)?.unwrap_or(0.0),
                    bound.optional_number(2)?.unwrap_or(0.0),
                ];
                rotate_xyz(solid, angles)
            }
            "scale" => {
                let bound = BoundArgs::bind(&callee, &["s"], 1, args)?;
                solid.scaled(bound.number(0)?)
            }
            "mirror" => {
                let bound = BoundArgs::bind(&callee, &["x", "y", "z"], 3, args)?;
                solid.mirrored([bound.number(0)?, bound.number(1)?, bound.number(2)?])
            }
            "polar" => {
                let bound = BoundArgs::bind(&callee, &["n"], 1, args)?;
                solid.polar(self.polar_count(&bound)?)
            }
            "union" => return fold_shapes(&callee, SetOp::Union, prepend(Value::Solid(solid), args)),
            "difference" => {
                return fold_shapes(&callee, SetOp::Difference, prepend(Value::Solid(solid), args));
            }
            "intersection" => {
                return fold_shapes(&callee, SetOp::Intersection, prepend(Value::Solid(solid), args));
            }
            _ => {
                return Err(ScriptError::new(format!(
                    "3D solid has no method '{method}'{}",
                    did_you_mean(method, SOLID_METHODS)
                )));
            }
        };
        result.map(Value::Solid).map_err(geometry)
    }

    fn polar_count(&self, bound: &BoundArgs) -> Result<usize, ScriptError> {
        let count = bound.count(0)?;
        if count == 0 || count > self.limits.max_polar_count {
            return Err(ScriptError::new(format!(
                "polar count must be between 1 and {}",
                self.limits.max_polar_count
            )));
        }
        Ok(count)
    }
}

/// Applies X, then Y, then Z rotations given in degrees.
fn rotate_xyz(solid: Solid, angles: [f64; 3]) -> Result<Solid, GeometryError> {
    let mut solid = solid;
    for (axis, angle) in [Axis::X, Axis::Y, Axis::Z].into_iter().zip(angles) {
        if angle != 0.0 {
            solid = solid.rotated(axis, angle.to_radians())?;
        }
    }
    Ok(solid)
}

fn geometry(err: GeometryError) -> ScriptError {
    ScriptError::new(err.to_string())
}

fn is_shape(value: &Value) -> bool {
    matches!(value, Value::Profile(_) | Value::Solid(_))
}

fn prepend(first: Value, args: CallArgs) -> CallArgs {
    let mut all = Vec::with_capacity(args.len() + 1);
    all.push((None, first));
    all.extend(args);
    all
}

fn arithmetic(op: BinaryOp, a: f64, b: f64) -> Result<Value, ScriptError> {
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(ScriptError::new("division by zero"));
            }
            a / b
        }
        BinaryOp::And => {
            return Err(ScriptError::new(
                "unsupported operand types for &: number and number",
            ));
        }
    };
    finite(value)
}

fn finite(value: f64) -> Result<Value, ScriptError> {
    if value.is_finite() {
        Ok(Value::Number(value))
    } else {
        Err(ScriptError::new("arithmetic result is not a finite number"))
    }
}

fn scale_value(shape: Value, factor: f64) -> Result<Value, ScriptError> {
    match shape {
        Value::Profile(profile) => profile.scaled(factor).map(Value::Profile).map_err(geometry),
        Value::Solid(solid) => solid.scaled(factor).map(Value::Solid).map_err(geometry),
        other => Err(ScriptError::new(format!("cannot scale a {}", other.kind()))),
    }
}

fn combine(op: SetOp, lhs: Value, rhs: Value) -> Result<Value, ScriptError> {
    match (lhs, rhs) {
        (Value::Profile(a), Value::Profile(b)) => Ok(Value::Profile(match op {
            SetOp::Union => a.union(b),
            SetOp::Difference => a.difference(b),
            SetOp::Intersection => a.intersection(b),
        })),
        (Value::Solid(a), Value::Solid(b)) => Ok(Value::Solid(match op {
            SetOp::Union => a.union(b),
            SetOp::Difference => a.difference(b),
            SetOp::Intersection => a.intersection(b),
        })),
        (Value::Profile(_), Value::Solid(_)) | (Value::Solid(_), Value::Profile(_)) => {
            Err(ScriptError::new(format!(
                "cannot {} a 2D profile and a 3D solid; extrude the profile first",
                op.verb()
            )))
        }
        (a, b) => Err(ScriptError::new(format!(
            "cannot {} {} and {}",
            op.verb(),
            a.kind(),
            b.kind()
        ))),
    }
}

/// `union(a, b, ...)` style calls. A single list argument is spread.
fn fold_shapes(callee: &str, op: SetOp, args: CallArgs) -> Result<Value, ScriptError> {
    if let Some((Some(name), _)) = args.iter().find(|(name, _)| name.is_some()) {
        return Err(ScriptError::new(format!(
            "{callee} takes positional shapes only, got '{name}'"
        )));
    }
    let mut shapes: Vec<Value> = args.into_iter().map(|(_, value)| value).collect();
    if shapes.len() == 1
        && matches!(shapes.first(), Some(Value::List(_)))
        && let Some(Value::List(items)) = shapes.pop()
    {
        shapes = items;
    }

    let mut iter = shapes.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| ScriptError::new(format!("{callee} needs at least one shape")))?;
    if !is_shape(&first) {
        return Err(ScriptError::new(format!(
            "{callee} expects shapes, got {}",
            first.kind()
        )));
    }
    iter.try_fold(first, |acc, next| combine(op, acc, next))
}

fn call_math(name: &str, args: CallArgs) -> Result<Value, ScriptError> {
    if name == "min" || name == "max" {
        let mut values: Vec<Value> = args.into_iter().map(|(_, value)| value).collect();
        if values.len() == 1
            && matches!(values.first(), Some(Value::List(_)))
            && let Some(Value::List(items)) = values.pop()
        {
            values = items;
        }
        let numbers = values
            .iter()
            .map(|value| match value {
                Value::Number(number) => Ok(*number),
                other => Err(ScriptError::new(format!(
                    "{name} expects numbers, got {}",
                    other.kind()
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let folded = if name == "min" {
            numbers.iter().copied().reduce(f64::min)
        } else {
            numbers.iter().copied().reduce(f64::max)
        };
        return folded
            .map(Value::Number)
            .ok_or_else(|| ScriptError::new(format!("{name} needs at least one number")));
    }

    let bound = BoundArgs::bind(name, &["x"], 1, args)?;
    let x = bound.number(0)?;
    let value = match name {
        "sin" => x.sin(),
        "cos" => x.cos(),
        "tan" => x.tan(),
        "sqrt" => {
            if x < 0.0 {
                return Err(ScriptError::new("sqrt of a negative number"));
            }
            x.sqrt()
        }
        "abs" => x.abs(),
        "floor" => x.floor(),
        "ceil" => x.ceil(),
        "radians" => x.to_radians(),
        "degrees" => x.to_degrees(),
        _ => return Err(ScriptError::new(format!("unknown function '{name}'"))),
    };
    finite(value)
}

/// `f([a, b, c])` is read as `f(a, b, c)` for vector-taking callees.
fn expand_vector_arg(args: &mut CallArgs) {
    let is_vector = matches!(
        args.as_slice(),
        [(None, Value::List(items))] if items.iter().all(|item| matches!(item, Value::Number(_)))
    );
    if is_vector && let Some((_, Value::List(items))) = args.pop() {
        args.extend(items.into_iter().map(|item| (None, item)));
    }
}

/// Long-form parameter names accepted as aliases.
fn canonical_param<'p>(name: &str, params: &[&'p str]) -> Option<&'p str> {
    if let Some(found) = params.iter().find(|param| **param == name) {
        return Some(*found);
    }
    let alias = match name {
        "radius" => "r",
        "height" => "h",
        "width" => "w",
        "size" => "x",
        "count" => "n",
        "factor" => "s",
        "deg" | "degrees" => "angle",
        _ => return None,
    };
    params.iter().find(|param| **param == alias).copied()
}

/// Arguments matched to a callee's parameter list.
struct BoundArgs {
    callee: String,
    params: Vec<&'static str>,
    values: Vec<Option<Value>>,
}

impl BoundArgs {
    fn bind(
        callee: &str,
        params: &[&'static str],
        required: usize,
        args: CallArgs,
    ) -> Result<Self, ScriptError> {
        let mut values: Vec<Option<Value>> = vec![None; params.len()];
        let mut positional = 0usize;
        let total = args.len();

        for (name, value) in args {
            match name {
                None => {
                    if positional >= params.len() {
                        return Err(ScriptError::new(format!(
                            "too many arguments for {callee}: expected {}, got {total}",
                            params.len()
                        )));
                    }
                    values[positional] = Some(value);
                    positional += 1;
                }
                Some(name) => {
                    let Some(param) = canonical_param(&name, params) else {
                        return Err(ScriptError::new(format!(
                            "unknown argument '{name}' for {callee}{}",
                            did_you_mean(&name, params)
                        )));
                    };
                    let index = params
                        .iter()
                        .position(|candidate| *candidate == param)
                        .unwrap_or_default();
                    if values[index].is_some() {
                        return Err(ScriptError::new(format!(
                            "duplicate argument '{param}' for {callee}"
                        )));
                    }
                    values[index] = Some(value);
                }
            }
        }

        if let Some(missing) = params
            .iter()
            .take(required)
            .zip(values.iter())
            .find(|(_, value)| value.is_none())
        {
            return Err(ScriptError::new(format!(
                "missing parameter '{}' for {callee}",
                missing.0
            )));
        }

        Ok(Self {
            callee: callee.to_string(),
            params: params.to_vec(),
            values,
        })
    }

    fn number(&self, index: usize) -> Result<f64, ScriptError> {
        self.optional_number(index)?.ok_or_else(|| {
            ScriptError::new(format!(
                "missing parameter '{}' for {}",
                self.params[index], self.callee
            ))
        })
    }

    fn optional_number(&self, index: usize) -> Result<Option<f64>, ScriptError> {
        match self.values.get(index).and_then(Option::as_ref) {
            None => Ok(None),
            Some(Value::Number(value)) => Ok(Some(*value)),
            Some(other) => Err(self.type_error(index, "a number", other)),
        }
    }

    fn count(&self, index: usize) -> Result<usize, ScriptError> {
        self.optional_count(index)?.ok_or_else(|| {
            ScriptError::new(format!(
                "missing parameter '{}' for {}",
                self.params[index], self.callee
            ))
        })
    }

    fn optional_count(&self, index: usize) -> Result<Option<usize>, ScriptError> {
        match self.optional_number(index)? {
            None => Ok(None),
            Some(value) if value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64 => {
                Ok(Some(value as usize))
            }
            Some(value) => Err(ScriptError::new(format!(
                "{} expects a whole number for '{}', got {value}",
                self.callee, self.params[index]
            ))),
        }
    }

    fn points(&mut self, index: usize, max_len: usize) -> Result<Vec<Point2>, ScriptError> {
        let value = self.values.get_mut(index).and_then(Option::take);
        let items = match value {
            Some(Value::List(items)) => items,
            Some(other) => return Err(self.type_error(index, "a list of points", &other)),
            None => {
                return Err(ScriptError::new(format!(
                    "missing parameter '{}' for {}",
                    self.params[index], self.callee
                )));
            }
        };
        if items.len() > max_len {
            return Err(ScriptError::new(format!(
                "{} accepts at most {max_len} points",
                self.callee
            )));
        }
        items
            .iter()
            .map(|item| match item {
                Value::List(pair) => match pair.as_slice() {
                    [Value::Number(x), Value::Number(y)] => Ok([*x, *y]),
                    _ => Err(ScriptError::new(format!(
                        "{} points must be [x, y] pairs",
                        self.callee
                    ))),
                },
                other => Err(ScriptError::new(format!(
                    "{} points must be [x, y] pairs, got {}",
                    self.callee,
                    other.kind()
                ))),
            })
            .collect()
    }

    fn type_error(&self, index: usize, expected: &str, got: &Value) -> ScriptError {
        ScriptError::new(format!(
            "{} expects {expected} for '{}', got {}",
            self.callee,
            self.params[index],
            got.kind()
        ))
    }
}

#[derive(Debug, Clone, Copy)]
struct Metrics {
    cost: usize,
    depth: usize,
}

impl Metrics {
    const LEAF: Metrics = Metrics { cost: 1, depth: 1 };

    fn wrap(self) -> Metrics {
        Metrics {
            cost: self.cost.saturating_add(1),
            depth: self.depth + 1,
        }
    }

    fn join(self, other: Metrics) -> Metrics {
        Metrics {
            cost: self.cost.saturating_add(other.cost).saturating_add(1),
            depth: self.depth.max(other.depth) + 1,
        }
    }

    fn repeat(self, count: usize) -> Metrics {
        Metrics {
            cost: self.cost.saturating_mul(count).saturating_add(1),
            depth: self.depth + 1,
        }
    }
}

fn profile_metrics(profile: &Profile) -> Metrics {
    match profile {
        Profile::Circle(_) | Profile::Rect(_) => Metrics::LEAF,
        // Every edge is visited per sample.
        Profile::Polygon(polygon) => Metrics {
            cost: polygon.vertices().len(),
            depth: 1,
        },
        Profile::Union(a, b) | Profile::Difference(a, b) | Profile::Intersection(a, b) => {
            profile_metrics(a).join(profile_metrics(b))
        }
        Profile::Translate { shape, .. }
        | Profile::Rotate { shape, .. }
        | Profile::Scale { shape, .. }
        | Profile::Offset { shape, .. } => profile_metrics(shape).wrap(),
        Profile::Polar { shape, count } => profile_metrics(shape).repeat(*count),
    }
}

fn solid_metrics(solid: &Solid) -> Metrics {
    match solid {
        Solid::Sphere { .. }
        | Solid::Cuboid { .. }
        | Solid::Cylinder { .. }
        | Solid::Cone { .. }
        | Solid::Torus { .. } => Metrics::LEAF,
        Solid::Extrude { profile, .. } | Solid::Revolve { profile } => {
            profile_metrics(profile).wrap()
        }
        Solid::Union(a, b) | Solid::Difference(a, b) | Solid::Intersection(a, b) => {
            solid_metrics(a).join(solid_metrics(b))
        }
        Solid::Translate { shape, .. }
        | Solid::Rotate { shape, .. }
        | Solid::Scale { shape, .. }
        | Solid::Mirror { shape, .. } => solid_metrics(shape).wrap(),
        Solid::Polar { shape, count } => solid_metrics(shape).repeat(*count),
    }
}

fn did_you_mean(name: &str, candidates: &[&str]) -> String {
    suggest_name(name, candidates)
        .map(|candidate| format!(". Did you mean '{candidate}'?"))
        .unwrap_or_default()
}

fn suggest_name<'a>(name: &str, candidates: &[&'a str]) -> Option<&'a str> {
    let mut best: Option<(&str, usize)> = None;

    for candidate in candidates {
        let distance = levenshtein(name, candidate);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((candidate, distance)),
        }
    }

    match best {
        Some((candidate, distance)) if distance <= 3 && distance < name.len().max(1) => {
            Some(candidate)
        }
        _ => None,
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b_len = b.chars().count();
    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0usize; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let deletion = prev[j + 1] + 1;
            let insertion = curr[j] + 1;
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = deletion.min(insertion).min(substitution);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}
