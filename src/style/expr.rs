//! Length expression resolver using cssparser
//!
//! Handles what the engine path needs beyond plain units: `em`/`rem`,
//! `calc()`, `min()`, `max()`, `clamp()` and `var()` with fallbacks.
//! Values are kept as a linear combination `px + pct%` until the end, so a
//! pure percentage stays a percentage for the constraint engine to resolve.

use std::collections::BTreeMap;

use cssparser::{BasicParseErrorKind, ParseError, Parser, ParserInput, Token};

use crate::document::StyleValue;
use crate::utils::{warn_once, Viewport};

/// Inherited custom properties (`--name` → raw value)
pub type CustomProperties = BTreeMap<String, String>;

/// Nesting limit for `var()` substitution; deeper chains are treated as cycles
pub const MAX_VAR_DEPTH: usize = 16;

/// Inputs an expression may depend on
#[derive(Debug, Clone, Copy)]
pub struct ExprContext<'a> {
    /// Percentage basis, when known
    pub available: Option<f32>,
    pub viewport: Option<Viewport>,
    /// Computed font size of the element, for `em`
    pub font_size: f32,
    /// Root font size, for `rem`
    pub root_font_size: f32,
    pub vars: &'a CustomProperties,
}

/// Outcome of resolving a length expression
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolvedLength {
    Auto,
    Px(f32),
    /// Fraction of the percentage basis (50% is 0.5)
    Percent(f32),
}

impl ResolvedLength {
    /// Pixels, resolving a percentage against `basis`
    pub fn to_px(self, basis: Option<f32>) -> Option<f32> {
        match self {
            ResolvedLength::Auto => None,
            ResolvedLength::Px(px) => Some(px),
            ResolvedLength::Percent(frac) => basis.map(|b| b * frac),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Value {
    Number(f64),
    /// `px + pct%`, where `pct` is in CSS percent units
    Length { px: f64, pct: f64 },
}

type ExprResult<'i> = std::result::Result<Value, ParseError<'i, ()>>;

/// Resolve an authored value. `None` means the expression is unsupported or
/// depends on something the context cannot supply; a warning is logged once.
pub fn resolve_length(value: &StyleValue, ctx: &ExprContext<'_>) -> Option<ResolvedLength> {
    match value {
        StyleValue::Number(n) => Some(ResolvedLength::Px(*n as f32)),
        StyleValue::Text(text) => evaluate(text, ctx),
    }
}

/// Resolve a CSS length expression
pub fn evaluate(text: &str, ctx: &ExprContext<'_>) -> Option<ResolvedLength> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("auto") {
        return Some(ResolvedLength::Auto);
    }
    let Some(expanded) = substitute_vars(text, ctx.vars, 0) else {
        warn_once(text, || format!("unresolvable var() in {:?}", text));
        return None;
    };
    if expanded.trim().eq_ignore_ascii_case("auto") {
        return Some(ResolvedLength::Auto);
    }

    let mut input = ParserInput::new(&expanded);
    let mut parser = Parser::new(&mut input);
    let parsed = parser.parse_entirely(|p| parse_sum(p, ctx));
    let resolved = match parsed {
        Ok(Value::Number(n)) => Some(ResolvedLength::Px(n as f32)),
        Ok(Value::Length { px, pct }) if pct == 0.0 => Some(ResolvedLength::Px(px as f32)),
        Ok(Value::Length { px, pct }) if px == 0.0 => Some(ResolvedLength::Percent((pct / 100.0) as f32)),
        Ok(Value::Length { px, pct }) => ctx
            .available
            .map(|a| ResolvedLength::Px((px + pct * f64::from(a) / 100.0) as f32)),
        Err(_) => None,
    };
    if resolved.is_none() {
        warn_once(text, || format!("unsupported length expression {:?}", text));
    }
    resolved
}

/// Textually substitute every `var(--name[, fallback])`
fn substitute_vars(text: &str, vars: &CustomProperties, depth: usize) -> Option<String> {
    if depth > MAX_VAR_DEPTH {
        return None;
    }
    let Some(start) = text.find("var(") else {
        return Some(text.to_string());
    };
    let open = start + "var(".len();
    let mut level = 1;
    let mut end = None;
    let mut comma = None;
    for (i, c) in text[open..].char_indices() {
        match c {
            '(' => level += 1,
            ')' => {
                level -= 1;
                if level == 0 {
                    end = Some(open + i);
                    break;
                }
            }
            ',' if level == 1 && comma.is_none() => comma = Some(open + i),
            _ => {}
        }
    }
    let end = end?;
    let name = text[open..comma.unwrap_or(end)].trim();
    let replacement = match vars.get(name) {
        Some(value) => value.as_str(),
        None => text[comma? + 1..end].trim(),
    };
    let replacement = substitute_vars(replacement, vars, depth + 1)?;
    let rest = substitute_vars(&text[end + 1..], vars, depth)?;
    Some(format!("{}{}{}", &text[..start], replacement, rest))
}

fn parse_sum<'i>(p: &mut Parser<'i, '_>, ctx: &ExprContext<'_>) -> ExprResult<'i> {
    let mut acc = parse_product(p, ctx)?;
    loop {
        let state = p.state();
        let sign = match p.next() {
            Ok(Token::Delim('+')) => 1.0,
            Ok(Token::Delim('-')) => -1.0,
            _ => {
                p.reset(&state);
                return Ok(acc);
            }
        };
        let rhs = parse_product(p, ctx)?;
        acc = match (acc, rhs) {
            (Value::Number(a), Value::Number(b)) => Value::Number(a + sign * b),
            (Value::Length { px: a, pct: ap }, Value::Length { px: b, pct: bp }) => Value::Length {
                px: a + sign * b,
                pct: ap + sign * bp,
            },
            _ => return Err(p.new_custom_error(())),
        };
    }
}

fn parse_product<'i>(p: &mut Parser<'i, '_>, ctx: &ExprContext<'_>) -> ExprResult<'i> {
    let mut acc = parse_atom(p, ctx)?;
    loop {
        let state = p.state();
        let divide = match p.next() {
            Ok(Token::Delim('*')) => false,
            Ok(Token::Delim('/')) => true,
            _ => {
                p.reset(&state);
                return Ok(acc);
            }
        };
        let rhs = parse_atom(p, ctx)?;
        acc = match (acc, rhs, divide) {
            (Value::Number(a), Value::Number(b), false) => Value::Number(a * b),
            (Value::Number(k), Value::Length { px, pct }, false)
            | (Value::Length { px, pct }, Value::Number(k), false) => Value::Length {
                px: px * k,
                pct: pct * k,
            },
            (_, Value::Number(b), true) if b == 0.0 => return Err(p.new_custom_error(())),
            (Value::Number(a), Value::Number(b), true) => Value::Number(a / b),
            (Value::Length { px, pct }, Value::Number(b), true) => Value::Length {
                px: px / b,
                pct: pct / b,
            },
            _ => return Err(p.new_custom_error(())),
        };
    }
}

fn parse_atom<'i>(p: &mut Parser<'i, '_>, ctx: &ExprContext<'_>) -> ExprResult<'i> {
    let token = p.next()?.clone();
    match token {
        Token::Number { value, .. } => Ok(Value::Number(f64::from(value))),
        Token::Percentage { unit_value, .. } => Ok(Value::Length {
            px: 0.0,
            pct: f64::from(unit_value) * 100.0,
        }),
        Token::Dimension { value, unit, .. } => match unit_to_px(&unit, ctx) {
            Some(scale) => Ok(Value::Length {
                px: f64::from(value) * scale,
                pct: 0.0,
            }),
            None => Err(p.new_custom_error(())),
        },
        Token::ParenthesisBlock => p.parse_nested_block(|p| parse_sum(p, ctx)),
        Token::Function(name) => {
            let name = name.to_ascii_lowercase();
            match name.as_str() {
                "calc" => p.parse_nested_block(|p| parse_sum(p, ctx)),
                "min" | "max" => {
                    let args = p.parse_nested_block(|p| {
                        p.parse_comma_separated(|p| parse_sum(p, ctx))
                    })?;
                    pick(&args, name == "min", ctx).ok_or_else(|| p.new_custom_error(()))
                }
                "clamp" => {
                    let args = p.parse_nested_block(|p| {
                        p.parse_comma_separated(|p| parse_sum(p, ctx))
                    })?;
                    let [min, preferred, max] = args.as_slice() else {
                        return Err(p.new_custom_error(()));
                    };
                    pick(&[*preferred, *max], true, ctx)
                        .and_then(|capped| pick(&[*min, capped], false, ctx))
                        .ok_or_else(|| p.new_custom_error(()))
                }
                _ => Err(p.new_custom_error(())),
            }
        }
        _ => Err(p.new_error(BasicParseErrorKind::UnexpectedToken(token))),
    }
}

/// Pixels per unit
fn unit_to_px(unit: &str, ctx: &ExprContext<'_>) -> Option<f64> {
    let vp = |f: fn(&Viewport) -> f32| ctx.viewport.map(|v| f64::from(f(&v)) / 100.0);
    match unit.to_ascii_lowercase().as_str() {
        "px" => Some(1.0),
        "em" => Some(f64::from(ctx.font_size)),
        "rem" => Some(f64::from(ctx.root_font_size)),
        "vw" => vp(|v| v.width),
        "vh" => vp(|v| v.height),
        "vmin" => vp(|v| v.width.min(v.height)),
        "vmax" => vp(|v| v.width.max(v.height)),
        "pt" => Some(96.0 / 72.0),
        "pc" => Some(16.0),
        "in" => Some(96.0),
        "cm" => Some(96.0 / 2.54),
        "mm" => Some(96.0 / 25.4),
        _ => None,
    }
}

/// min()/max() over comparable arguments
fn pick(args: &[Value], smallest: bool, ctx: &ExprContext<'_>) -> Option<Value> {
    let key = |v: &Value| -> Option<f64> {
        match *v {
            Value::Number(n) => Some(n),
            Value::Length { px, pct } if pct == 0.0 => Some(px),
            Value::Length { px, pct } => ctx.available.map(|a| px + pct * f64::from(a) / 100.0),
        }
    };
    let all_numbers = args.iter().all(|v| matches!(v, Value::Number(_)));
    let all_lengths = args.iter().all(|v| matches!(v, Value::Length { .. }));
    if !(all_numbers || all_lengths) || args.is_empty() {
        return None;
    }
    // Pure percentages compare among themselves without a basis.
    let all_pure_percent = args
        .iter()
        .all(|v| matches!(v, Value::Length { px, .. } if *px == 0.0));
    let mut best: Option<(f64, Value)> = None;
    for arg in args {
        let k = match (key(arg), arg) {
            (Some(k), _) => k,
            (None, Value::Length { pct, .. }) if all_pure_percent => *pct,
            _ => return None,
        };
        let better = best.is_none_or(|(b, _)| if smallest { k < b } else { k > b });
        if better {
            best = Some((k, *arg));
        }
    }
    best.map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(vars: &CustomProperties) -> ExprContext<'_> {
        ExprContext {
            available: Some(400.0),
            viewport: Some(Viewport::new(1000.0, 800.0)),
            font_size: 20.0,
            root_font_size: 16.0,
            vars,
        }
    }

    #[test]
    fn test_plain_units() {
        let vars = CustomProperties::new();
        let c = ctx(&vars);
        assert_eq!(evaluate("10px", &c), Some(ResolvedLength::Px(10.0)));
        assert_eq!(evaluate("2em", &c), Some(ResolvedLength::Px(40.0)));
        assert_eq!(evaluate("2rem", &c), Some(ResolvedLength::Px(32.0)));
        assert_eq!(evaluate("10vw", &c), Some(ResolvedLength::Px(100.0)));
        assert_eq!(evaluate("25%", &c), Some(ResolvedLength::Percent(0.25)));
        assert_eq!(evaluate("auto", &c), Some(ResolvedLength::Auto));
        assert_eq!(evaluate("12", &c), Some(ResolvedLength::Px(12.0)));
    }

    #[test]
    fn test_calc_mixed_units() {
        let vars = CustomProperties::new();
        let c = ctx(&vars);
        assert_eq!(evaluate("calc(100% - 20px)", &c), Some(ResolvedLength::Px(380.0)));
        assert_eq!(evaluate("calc(2 * (10px + 1em))", &c), Some(ResolvedLength::Px(60.0)));
        assert_eq!(evaluate("calc(50% / 2)", &c), Some(ResolvedLength::Percent(0.25)));
        let no_basis = ExprContext { available: None, ..c };
        assert_eq!(evaluate("calc(100% - 20px)", &no_basis), None);
    }

    #[test]
    fn test_min_max_clamp() {
        let vars = CustomProperties::new();
        let c = ctx(&vars);
        assert_eq!(evaluate("min(50%, 150px)", &c), Some(ResolvedLength::Px(150.0)));
        assert_eq!(evaluate("max(50%, 150px)", &c), Some(ResolvedLength::Percent(0.5)));
        assert_eq!(evaluate("clamp(100px, 10%, 300px)", &c), Some(ResolvedLength::Px(100.0)));
        assert_eq!(evaluate("clamp(10px, 1000px, 300px)", &c), Some(ResolvedLength::Px(300.0)));
    }

    #[test]
    fn test_var_with_fallback() {
        let mut vars = CustomProperties::new();
        vars.insert("--gap".into(), "12px".into());
        vars.insert("--double".into(), "calc(var(--gap) * 2)".into());
        let c = ctx(&vars);
        assert_eq!(evaluate("var(--gap)", &c), Some(ResolvedLength::Px(12.0)));
        assert_eq!(evaluate("var(--double)", &c), Some(ResolvedLength::Px(24.0)));
        assert_eq!(evaluate("var(--missing, 8px)", &c), Some(ResolvedLength::Px(8.0)));
        assert_eq!(evaluate("var(--missing)", &c), None);
    }

    #[test]
    fn test_var_cycle_is_unresolved() {
        let mut vars = CustomProperties::new();
        vars.insert("--a".into(), "var(--b)".into());
        vars.insert("--b".into(), "var(--a)".into());
        assert_eq!(evaluate("var(--a)", &ctx(&vars)), None);
    }

    #[test]
    fn test_invalid_expressions() {
        let vars = CustomProperties::new();
        let c = ctx(&vars);
        assert_eq!(evaluate("10px + 5", &c), None);
        assert_eq!(evaluate("calc(10px / 0)", &c), None);
        assert_eq!(evaluate("10furlongs", &c), None);
        assert_eq!(evaluate("clamp(1px, 2px)", &c), None);
    }
}
