//! Evaluates a parsed (header, selector) pair into domain types: the final
//! pass described in §4.1 of the governing design, binding each selector
//! nesting level to its `parkey` tuple rather than running any selector
//! logic during evaluation.

use super::ast::Expr;
use crate::error::{CrdsError, Result, SourcePos};
use crate::selector::{
    CaseToken, ClosestGeometricRatio, ClosestTime, LinearInterpolation, MatchCase, MatchSelector,
    Node, Parameter, Selector, UseAfter, VersionDep,
};
use std::collections::HashMap;

fn eval_err(file: &str, message: impl Into<String>) -> CrdsError {
    CrdsError::MappingError { file: file.to_string(), message: message.into() }
}

/// The raw `header = {...}` dict, keyed by its literal string keys. Typed
/// accessors for the few keys the loader requires live on `Mapping`.
pub fn dict_to_map(file: &str, expr: &Expr) -> Result<HashMap<String, Expr>> {
    let pairs = expr.as_dict().ok_or_else(|| eval_err(file, "expected a dict literal"))?;
    let mut map = HashMap::with_capacity(pairs.len());
    for (k, v) in pairs {
        let key = k.as_str().ok_or_else(|| eval_err(file, "dict keys in 'header' must be strings"))?;
        map.insert(key.to_string(), v.clone());
    }
    Ok(map)
}

pub fn expr_to_string(file: &str, expr: &Expr) -> Result<String> {
    match expr {
        Expr::Str(s) => Ok(s.clone()),
        Expr::Num(n) => Ok(crate::value::Value::from(*n).as_str()),
        _ => Err(eval_err(file, "expected a string literal")),
    }
}

fn expr_to_f64(file: &str, expr: &Expr) -> Result<f64> {
    match expr {
        Expr::Num(n) => Ok(*n),
        Expr::Str(s) => s.trim().parse().map_err(|_| eval_err(file, format!("'{s}' is not numeric"))),
        _ => Err(eval_err(file, "expected a numeric literal")),
    }
}

/// `parkey` is a tuple of tuples: one parameter-name tuple per selector
/// nesting level.
pub fn parse_parkey(file: &str, expr: &Expr) -> Result<Vec<Vec<String>>> {
    let levels = expr.as_tuple().ok_or_else(|| eval_err(file, "'parkey' must be a tuple"))?;
    levels
        .iter()
        .map(|level| match level {
            Expr::Tuple(names) => {
                names.iter().map(|n| expr_to_string(file, n)).collect::<Result<Vec<_>>>()
            }
            Expr::Str(s) => Ok(vec![s.clone()]),
            _ => Err(eval_err(file, "each 'parkey' level must be a tuple of names")),
        })
        .collect()
}

pub fn parse_substitutions(
    file: &str,
    header: &HashMap<String, Expr>,
) -> Result<HashMap<String, HashMap<String, String>>> {
    let Some(expr) = header.get("substitutions") else { return Ok(HashMap::new()) };
    let outer = expr.as_dict().ok_or_else(|| eval_err(file, "'substitutions' must be a dict"))?;
    let mut result = HashMap::with_capacity(outer.len());
    for (parkey_expr, inner_expr) in outer {
        let parkey = expr_to_string(file, parkey_expr)?;
        let inner = inner_expr.as_dict().ok_or_else(|| {
            eval_err(file, format!("'substitutions[{parkey}]' must be a dict"))
        })?;
        let mut map = HashMap::with_capacity(inner.len());
        for (from, to) in inner {
            map.insert(expr_to_string(file, from)?, expr_to_string(file, to)?);
        }
        result.insert(parkey, map);
    }
    Ok(result)
}

fn parameters_at(file: &str, parkey: &[Vec<String>], level: usize) -> Result<Vec<Parameter>> {
    let names = parkey
        .get(level)
        .ok_or_else(|| eval_err(file, format!("selector nests deeper than 'parkey' ({level} levels) provides")))?;
    Ok(names
        .iter()
        .map(|n| match n.strip_prefix('*') {
            Some(bare) => Parameter::new(bare, true),
            None => Parameter::new(n.as_str(), false),
        })
        .collect())
}

fn single_parameter_at(file: &str, parkey: &[Vec<String>], level: usize) -> Result<String> {
    let params = parameters_at(file, parkey, level)?;
    match params.as_slice() {
        [p] => Ok(p.name.clone()),
        _ => Err(eval_err(file, format!("expected exactly one parkey name at level {level}"))),
    }
}

/// Builds the concrete selector tree rooted at `expr`, consuming one
/// `parkey` level per `Match`/`UseAfter`/`ClosestTime`/`ClosestGeometricRatio`/
/// `LinearInterpolation` nesting; `VersionDep` consumes none, since its
/// parameter (`sw_version`) is fixed rather than drawn from `parkey`.
pub fn build_node(
    file: &str,
    expr: &Expr,
    parkey: &[Vec<String>],
    level: usize,
    substitutions: &HashMap<String, HashMap<String, String>>,
) -> Result<Node> {
    match expr {
        Expr::Str(s) => Ok(Node::Leaf(s.clone())),
        Expr::Call { name, arg } => {
            let selector = match name.as_str() {
                "Match" => Selector::Match(build_match(file, arg, parkey, level, substitutions)?),
                "UseAfter" => Selector::UseAfter(build_use_after(file, arg, parkey, level, substitutions)?),
                "ClosestTime" => {
                    Selector::ClosestTime(build_closest_time(file, arg, parkey, level, substitutions)?)
                }
                "ClosestGeometricRatio" => Selector::ClosestGeometricRatio(build_closest_ratio(
                    file,
                    arg,
                    parkey,
                    level,
                    substitutions,
                )?),
                "LinearInterpolation" => {
                    Selector::LinearInterpolation(build_linterp(file, arg, parkey, level)?)
                }
                "VersionDep" => {
                    Selector::VersionDep(build_version_dep(file, arg, parkey, level, substitutions)?)
                }
                other => {
                    return Err(CrdsError::FormatError {
                        file: file.to_string(),
                        pos: SourcePos { line: 0, column: 0 },
                        message: format!("unknown selector constructor '{other}'"),
                    })
                }
            };
            Ok(Node::Sub(Box::new(selector)))
        }
        _ => Err(eval_err(file, "a selector value must be a basename string or a constructor call")),
    }
}

fn case_tokens(file: &str, key: &Expr, arity: usize) -> Result<Vec<CaseToken>> {
    if arity == 1 {
        if let Expr::Str(s) = key {
            return Ok(vec![CaseToken::Scalar(s.clone())]);
        }
    }
    let items = key.as_tuple().ok_or_else(|| eval_err(file, "Match case key must be a tuple"))?;
    if items.len() != arity {
        return Err(eval_err(
            file,
            format!("Match case key has {} fields but {arity} parameters were declared", items.len()),
        ));
    }
    items
        .iter()
        .map(|item| match item {
            Expr::Str(s) => Ok(CaseToken::Scalar(s.clone())),
            Expr::Tuple(alts) => {
                Ok(CaseToken::Tuple(alts.iter().map(|a| expr_to_string(file, a)).collect::<Result<_>>()?))
            }
            _ => Err(eval_err(file, "Match case key fields must be strings or tuples of strings")),
        })
        .collect()
}

fn build_match(
    file: &str,
    arg: &Expr,
    parkey: &[Vec<String>],
    level: usize,
    substitutions: &HashMap<String, HashMap<String, String>>,
) -> Result<MatchSelector> {
    let parameters = parameters_at(file, parkey, level)?;
    let pairs = arg.as_dict().ok_or_else(|| eval_err(file, "Match() expects a dict literal argument"))?;
    let mut cases = Vec::with_capacity(pairs.len());
    for (key_expr, value_expr) in pairs {
        let key = case_tokens(file, key_expr, parameters.len())?;
        let node = build_node(file, value_expr, parkey, level + 1, substitutions)?;
        cases.push(MatchCase { key, node });
    }
    let subs_by_name: HashMap<String, HashMap<String, String>> = parameters
        .iter()
        .filter_map(|p| substitutions.get(&p.name).map(|m| (p.name.clone(), m.clone())))
        .collect();
    MatchSelector::new(parameters, &subs_by_name, cases)
}

fn build_use_after(
    file: &str,
    arg: &Expr,
    parkey: &[Vec<String>],
    level: usize,
    substitutions: &HashMap<String, HashMap<String, String>>,
) -> Result<UseAfter> {
    let names = parkey.get(level).cloned().unwrap_or_default();
    let pairs = arg.as_dict().ok_or_else(|| eval_err(file, "UseAfter() expects a dict literal argument"))?;
    let mut cases = Vec::with_capacity(pairs.len());
    for (key_expr, value_expr) in pairs {
        let key = expr_to_string(file, key_expr)?;
        let node = build_node(file, value_expr, parkey, level + 1, substitutions)?;
        cases.push((key, node));
    }
    UseAfter::new(names, cases)
}

fn build_closest_time(
    file: &str,
    arg: &Expr,
    parkey: &[Vec<String>],
    level: usize,
    substitutions: &HashMap<String, HashMap<String, String>>,
) -> Result<ClosestTime> {
    let parameter = single_parameter_at(file, parkey, level)?;
    let pairs = arg.as_dict().ok_or_else(|| eval_err(file, "ClosestTime() expects a dict literal argument"))?;
    let mut cases = Vec::with_capacity(pairs.len());
    for (key_expr, value_expr) in pairs {
        let key = expr_to_string(file, key_expr)?;
        let node = build_node(file, value_expr, parkey, level + 1, substitutions)?;
        cases.push((key, node));
    }
    ClosestTime::new(parameter, cases)
}

fn build_closest_ratio(
    file: &str,
    arg: &Expr,
    parkey: &[Vec<String>],
    level: usize,
    substitutions: &HashMap<String, HashMap<String, String>>,
) -> Result<ClosestGeometricRatio> {
    let parameter = single_parameter_at(file, parkey, level)?;
    let pairs = arg
        .as_dict()
        .ok_or_else(|| eval_err(file, "ClosestGeometricRatio() expects a dict literal argument"))?;
    let mut cases = Vec::with_capacity(pairs.len());
    for (key_expr, value_expr) in pairs {
        let key = expr_to_f64(file, key_expr)?;
        let node = build_node(file, value_expr, parkey, level + 1, substitutions)?;
        cases.push((key, node));
    }
    ClosestGeometricRatio::new(parameter, cases)
}

fn build_linterp(
    file: &str,
    arg: &Expr,
    parkey: &[Vec<String>],
    level: usize,
) -> Result<LinearInterpolation> {
    let parameter = single_parameter_at(file, parkey, level)?;
    let pairs = arg
        .as_dict()
        .ok_or_else(|| eval_err(file, "LinearInterpolation() expects a dict literal argument"))?;
    let mut cases = Vec::with_capacity(pairs.len());
    for (key_expr, value_expr) in pairs {
        let key = expr_to_f64(file, key_expr)?;
        let value = expr_to_string(file, value_expr)?;
        cases.push((key, value));
    }
    LinearInterpolation::new(parameter, cases)
}

fn build_version_dep(
    file: &str,
    arg: &Expr,
    parkey: &[Vec<String>],
    level: usize,
    substitutions: &HashMap<String, HashMap<String, String>>,
) -> Result<VersionDep> {
    let pairs = arg.as_dict().ok_or_else(|| eval_err(file, "VersionDep() expects a dict literal argument"))?;
    let mut cases = Vec::with_capacity(pairs.len());
    for (key_expr, value_expr) in pairs {
        let key = expr_to_string(file, key_expr)?;
        // VersionDep does not consume a parkey level: its parameter is fixed.
        let node = build_node(file, value_expr, parkey, level, substitutions)?;
        cases.push((key, node));
    }
    VersionDep::new(cases)
}
