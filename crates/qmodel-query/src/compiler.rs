//! Compile expression trees to the server's functional query syntax.
//!
//! Functional forms:
//!
//! ```text
//! select:  ?[t;W;B;A]
//! update:  ![t;W;B;A]
//! delete:  ![t;W;0b;A]
//! exec:    ?[t;W;B;a]   (a may be a bare column symbol)
//! ```
//!
//! Predicates render infix with bare column names (`(price>100)`); the `B`
//! and `A` positions are dictionaries from alias symbols to value forms:
//! a bare symbol for a pure column, the parenthesized expression otherwise.
//! Compilation is deterministic; entries follow builder call order.

use qmodel_core::types::{self, QKind};
use qmodel_core::{Error, Result, Value, VectorData};

use crate::expr::Expr;

/// Compile one expression to its textual form.
pub fn compile_expr(expr: &Expr) -> Result<String> {
    match expr {
        Expr::Column(name) => Ok(name.clone()),
        Expr::Literal(value) => render_literal(value),
        Expr::BinOp { op, lhs, rhs } => {
            let l = compile_expr(lhs)?;
            let r = compile_expr(rhs)?;
            // Word operators need surrounding spaces; symbol operators
            // bind tight.
            if op.chars().all(|c| c.is_ascii_alphabetic()) {
                Ok(format!("({l} {op} {r})"))
            } else {
                Ok(format!("({l}{op}{r})"))
            }
        }
        Expr::Unary { op, operand } => Ok(format!("({op} {})", compile_expr(operand)?)),
        Expr::Call { func, args } => {
            let parts: Result<Vec<_>> = args.iter().map(compile_expr).collect();
            Ok(format!("{func}[{}]", parts?.join(";")))
        }
        Expr::Aggregate { func, column } => match column {
            Some(column) => Ok(format!("{func} {}", compile_expr(column)?)),
            None => Ok(format!("{func} i")),
        },
        Expr::Adverbed { adverb, inner } => match inner.as_ref() {
            Expr::Aggregate { .. } => {
                Ok(format!("{} {}", compile_expr(inner)?, adverb.as_str()))
            }
            Expr::Adverbed { .. } => Err(Error::query(
                "cannot chain two adverbs on the same aggregate",
            )),
            _ => Err(Error::query(format!(
                "adverb `{}` applies to aggregates only",
                adverb.as_str()
            ))),
        },
        Expr::Xbar { step, column } => Ok(format!(
            "({} xbar {})",
            compile_expr(step)?,
            compile_expr(column)?
        )),
        Expr::Fby { agg, column, group } => Ok(format!(
            "(({agg};{}) fby {})",
            compile_expr(column)?,
            compile_expr(group)?
        )),
        Expr::Within { column, lo, hi } => Ok(format!(
            "({} within ({};{}))",
            compile_expr(column)?,
            compile_expr(lo)?,
            compile_expr(hi)?
        )),
        Expr::Like { column, pattern } => Ok(format!(
            "({} like \"{}\")",
            compile_expr(column)?,
            escape_string(pattern)
        )),
        Expr::In { column, values } => {
            let parts: Result<Vec<_>> = values.iter().map(render_literal).collect();
            Ok(format!(
                "({} in ({}))",
                compile_expr(column)?,
                parts?.join(";")
            ))
        }
        Expr::Sort { descending, column } => {
            let dir = if *descending { "desc" } else { "asc" };
            Ok(format!("{dir} {}", compile_expr(column)?))
        }
    }
}

// ==================== Literal rendering ====================

/// Render a value as a server-syntax literal.
pub fn render_literal(value: &Value) -> Result<String> {
    Ok(match value {
        Value::Null(kind) => null_literal(*kind).to_string(),
        Value::Bool(b) => if *b { "1b" } else { "0b" }.to_string(),
        Value::Guid(g) => format!("\"{}\"", types::format_guid(g)),
        Value::Byte(b) => format!("0x{b:02x}"),
        Value::Short(v) => format!("{v}h"),
        Value::Int(v) => format!("{v}i"),
        Value::Long(v) => v.to_string(),
        Value::Real(v) => render_real(*v),
        Value::Float(v) => render_float(*v),
        Value::Char(c) => format!("\"{}\"", *c as char),
        Value::Symbol(s) => format!("`{s}"),
        Value::Timestamp(v) => types::format_timestamp(*v),
        Value::Month(v) => types::format_month(*v),
        Value::Date(v) => types::format_date(*v),
        Value::Datetime(v) => types::format_datetime(*v),
        Value::Timespan(v) => types::format_timespan(*v),
        Value::Minute(v) => types::format_minute(*v),
        Value::Second(v) => types::format_second(*v),
        Value::Time(v) => types::format_time(*v),
        Value::String(s) => format!("\"{}\"", escape_string(s)),
        Value::Vector(vector) => render_vector(vector)?,
        Value::List(items) => {
            if items.is_empty() {
                "()".to_string()
            } else {
                let parts: Result<Vec<_>> = items.iter().map(render_literal).collect();
                format!("({})", parts?.join(";"))
            }
        }
        Value::Table(_) | Value::Dict(_) | Value::Function(_) => {
            return Err(Error::query(format!(
                "value cannot be rendered as a literal: {value:?}"
            )))
        }
    })
}

/// Typed-null literal per kind.
pub fn null_literal(kind: QKind) -> &'static str {
    match kind {
        QKind::Boolean => "0b",
        QKind::Guid => "0Ng",
        QKind::Byte => "0x00",
        QKind::Short => "0Nh",
        QKind::Int => "0Ni",
        QKind::Long => "0N",
        QKind::Real => "0Ne",
        QKind::Float => "0n",
        QKind::Char => "\" \"",
        QKind::Symbol => "`",
        QKind::Timestamp => "0Np",
        QKind::Month => "0Nm",
        QKind::Date => "0Nd",
        QKind::Datetime => "0Nz",
        QKind::Timespan => "0Nn",
        QKind::Minute => "0Nu",
        QKind::Second => "0Nv",
        QKind::Time => "0Nt",
    }
}

fn render_float(v: f64) -> String {
    if v.is_nan() {
        return "0n".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "0w" } else { "-0w" }.to_string();
    }
    let text = format!("{v}");
    // An integral float needs the suffix to stay a float on the server.
    if text.contains('.') || text.contains('e') {
        text
    } else {
        format!("{text}f")
    }
}

fn render_real(v: f32) -> String {
    if v.is_nan() {
        return "0Ne".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "0We" } else { "-0We" }.to_string();
    }
    format!("{v}e")
}

fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn render_vector(vector: &qmodel_core::Vector) -> Result<String> {
    if vector.is_empty() {
        return Ok("()".to_string());
    }
    Ok(match &vector.data {
        VectorData::Symbol(items) => items
            .iter()
            .map(|s| format!("`{s}"))
            .collect::<Vec<_>>()
            .concat(),
        VectorData::Boolean(items) => {
            let bits: String = items.iter().map(|b| if *b { '1' } else { '0' }).collect();
            format!("{bits}b")
        }
        VectorData::Byte(items) => {
            let hex: String = items.iter().map(|b| format!("{b:02x}")).collect();
            format!("0x{hex}")
        }
        _ => {
            // Space-separated scalar literals; typed nulls keep the column
            // parseable.
            let mut parts = Vec::with_capacity(vector.len());
            for i in 0..vector.len() {
                let element = vector.get(i).expect("index in range");
                parts.push(render_literal(&element)?);
            }
            parts.join(" ")
        }
    })
}

// ==================== Dictionary assembly ====================

/// Build a dictionary from `(alias, value-form)` pairs.
///
/// A single entry uses `enlist` on both sides; several entries use the
/// compact symbol-run form.
pub fn compile_dict(entries: &[(String, String)]) -> String {
    match entries {
        [] => "()".to_string(),
        [(name, value)] => format!("(enlist `{name})!enlist {value}"),
        _ => {
            let keys: String = entries.iter().map(|(n, _)| format!("`{n}")).collect();
            let values: Vec<&str> = entries.iter().map(|(_, v)| v.as_str()).collect();
            format!("{keys}!({})", values.join(";"))
        }
    }
}

/// Value form used inside `B`/`A` dictionaries: a bare symbol for a pure
/// column, the parenthesized expression otherwise.
pub fn naming_form(expr: &Expr) -> Result<String> {
    match expr {
        Expr::Column(name) => Ok(format!("`{name}")),
        _ => {
            let compiled = compile_expr(expr)?;
            if compiled.starts_with('(') {
                Ok(compiled)
            } else {
                Ok(format!("({compiled})"))
            }
        }
    }
}

/// Infer a column alias for an unnamed projection.
fn infer_name(expr: &Expr, index: usize) -> String {
    match expr {
        Expr::Column(name) => name.clone(),
        Expr::Aggregate { func, column } => match column.as_deref() {
            Some(Expr::Column(name)) => format!("{func}_{name}"),
            _ => (*func).to_string(),
        },
        Expr::Adverbed { inner, .. } => infer_name(inner, index),
        Expr::Xbar { column, .. } | Expr::Sort { column, .. } => infer_name(column, index),
        _ => format!("x{index}"),
    }
}

/// `(alias, value-form)` pairs for a projection list, aliases inferred
/// where absent.
pub fn projection_entries(
    projections: &[(Option<String>, Expr)],
) -> Result<Vec<(String, String)>> {
    projections
        .iter()
        .enumerate()
        .map(|(i, (alias, expr))| {
            let value = naming_form(expr)?;
            let name = alias.clone().unwrap_or_else(|| infer_name(expr, i));
            Ok((name, value))
        })
        .collect()
}

// ==================== Clause compilation ====================

/// `W`: `()` with no predicates, else `enlist (p1;p2;…)` over the
/// already-parenthesized predicate list.
pub fn compile_where(predicates: &[Expr]) -> Result<String> {
    if predicates.is_empty() {
        return Ok("()".to_string());
    }
    let parts: Result<Vec<_>> = predicates.iter().map(compile_expr).collect();
    Ok(format!("enlist ({})", parts?.join(";")))
}

/// `B`: `0b` with no grouping, else an alias dictionary.
pub fn compile_by(by: &[(Option<String>, Expr)]) -> Result<String> {
    if by.is_empty() {
        return Ok("0b".to_string());
    }
    Ok(compile_dict(&projection_entries(by)?))
}

/// `A` for select/update: `()` for all columns, else an alias dictionary.
pub fn compile_columns(projections: &[(Option<String>, Expr)]) -> Result<String> {
    if projections.is_empty() {
        return Ok("()".to_string());
    }
    Ok(compile_dict(&projection_entries(projections)?))
}

/// `a` for exec: a single unnamed pure column collapses to its bare
/// symbol (vector result); a single unnamed expression keeps its compiled
/// form; anything else is a dictionary (dict result).
pub fn compile_exec_columns(projections: &[(Option<String>, Expr)]) -> Result<String> {
    match projections {
        [] => Ok("()".to_string()),
        [(None, Expr::Column(name))] => Ok(format!("`{name}")),
        [(None, expr)] => compile_expr(expr),
        _ => Ok(compile_dict(&projection_entries(projections)?)),
    }
}

// ==================== Functional forms ====================

pub fn compile_functional_select(
    table: &str,
    predicates: &[Expr],
    by: &[(Option<String>, Expr)],
    projections: &[(Option<String>, Expr)],
) -> Result<String> {
    Ok(format!(
        "?[{table};{};{};{}]",
        compile_where(predicates)?,
        compile_by(by)?,
        compile_columns(projections)?
    ))
}

pub fn compile_functional_update(
    table: &str,
    predicates: &[Expr],
    by: &[(Option<String>, Expr)],
    assignments: &[(String, Expr)],
) -> Result<String> {
    let entries: Result<Vec<(String, String)>> = assignments
        .iter()
        .map(|(name, expr)| Ok((name.clone(), naming_form(expr)?)))
        .collect();
    Ok(format!(
        "![{table};{};{};{}]",
        compile_where(predicates)?,
        compile_by(by)?,
        compile_dict(&entries?)
    ))
}

pub fn compile_functional_delete(
    table: &str,
    predicates: &[Expr],
    columns: Option<&[String]>,
) -> Result<String> {
    match columns {
        Some(cols) if !cols.is_empty() => {
            if !predicates.is_empty() {
                return Err(Error::query(
                    "delete removes either rows or columns, not both",
                ));
            }
            let run: String = cols.iter().map(|c| format!("`{c}")).collect();
            Ok(format!("![{table};();0b;{run}]"))
        }
        _ => Ok(format!(
            "![{table};{};0b;()]",
            compile_where(predicates)?
        )),
    }
}

pub fn compile_functional_exec(
    table: &str,
    predicates: &[Expr],
    by: &[(Option<String>, Expr)],
    projections: &[(Option<String>, Expr)],
) -> Result<String> {
    Ok(format!(
        "?[{table};{};{};{}]",
        compile_where(predicates)?,
        compile_by(by)?,
        compile_exec_columns(projections)?
    ))
}

/// Apply paging wrappers: `offset n` then `limit m` compose to
/// `m#(n_(X))`.
pub fn apply_paging(compiled: String, limit: Option<i64>, offset: Option<i64>) -> String {
    let mut out = compiled;
    if let Some(n) = offset {
        out = format!("{n}_({out})");
    }
    if let Some(m) = limit {
        out = format!("{m}#({out})");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{avg, col, count, fby, lit, max, xbar};
    use qmodel_core::types::days_from_civil;
    use qmodel_core::Vector;

    fn c(expr: &Expr) -> String {
        compile_expr(expr).unwrap()
    }

    #[test]
    fn predicates_render_infix_without_spaces() {
        assert_eq!(c(&col("price").gt(100i64)), "(price>100)");
        assert_eq!(c(&col("sym").eq("AAPL")), "(sym=`AAPL)");
        assert_eq!(c(&col("size").ne(0i64)), "(size<>0)");
    }

    #[test]
    fn word_operators_keep_spaces() {
        assert_eq!(c(&(col("a") % lit(3i64))), "(a mod 3)");
    }

    #[test]
    fn division_remaps_to_percent() {
        assert_eq!(c(&(col("a") / col("b"))), "(a%b)");
    }

    #[test]
    fn unary_forms() {
        assert_eq!(c(&col("x").neg()), "(neg x)");
        assert_eq!(c(&col("flag").not()), "(not flag)");
    }

    #[test]
    fn aggregates_and_adverbs() {
        assert_eq!(c(&avg(col("price"))), "avg price");
        assert_eq!(c(&count()), "count i");
        assert_eq!(c(&avg(col("price")).each()), "avg price each");
        assert_eq!(c(&avg(col("price")).peach()), "avg price peach");
    }

    #[test]
    fn double_adverb_is_rejected() {
        let err = compile_expr(&avg(col("price")).each().peach()).unwrap_err();
        assert!(format!("{err}").contains("adverb"));
    }

    #[test]
    fn special_forms() {
        assert_eq!(c(&xbar(lit(5i64), col("size"))), "(5 xbar size)");
        assert_eq!(
            c(&fby("max", col("price"), col("sym"))),
            "((max;price) fby sym)"
        );
        assert_eq!(
            c(&col("price").within(10i64, 20i64)),
            "(price within (10;20))"
        );
        assert_eq!(c(&col("sym").like("AA*")), "(sym like \"AA*\")");
        assert_eq!(
            c(&col("sym").in_([Value::symbol("AAPL"), Value::symbol("GOOG")])),
            "(sym in (`AAPL;`GOOG))"
        );
        assert_eq!(c(&col("price").asc()), "asc price");
        assert_eq!(c(&col("price").desc()), "desc price");
    }

    #[test]
    fn call_application() {
        assert_eq!(
            c(&crate::expr::call("deltas", vec![col("price")])),
            "deltas[price]"
        );
    }

    #[test]
    fn numeric_literals() {
        assert_eq!(render_literal(&Value::Long(100)).unwrap(), "100");
        assert_eq!(render_literal(&Value::Int(7)).unwrap(), "7i");
        assert_eq!(render_literal(&Value::Short(-3)).unwrap(), "-3h");
        assert_eq!(render_literal(&Value::Float(150.25)).unwrap(), "150.25");
        assert_eq!(render_literal(&Value::Float(100.0)).unwrap(), "100f");
        assert_eq!(render_literal(&Value::Real(1.5)).unwrap(), "1.5e");
        assert_eq!(render_literal(&Value::Bool(true)).unwrap(), "1b");
        assert_eq!(render_literal(&Value::Byte(0x1f)).unwrap(), "0x1f");
    }

    #[test]
    fn temporal_literals() {
        let date = days_from_civil(2026, 2, 17);
        assert_eq!(render_literal(&Value::Date(date)).unwrap(), "2026.02.17");
        assert_eq!(
            render_literal(&Value::Timestamp(
                date as i64 * qmodel_core::types::NANOS_PER_DAY
            ))
            .unwrap(),
            "2026.02.17D00:00:00.000000000"
        );
    }

    #[test]
    fn null_literals_are_typed() {
        assert_eq!(render_literal(&Value::Null(QKind::Long)).unwrap(), "0N");
        assert_eq!(render_literal(&Value::Null(QKind::Float)).unwrap(), "0n");
        assert_eq!(render_literal(&Value::Null(QKind::Date)).unwrap(), "0Nd");
        assert_eq!(render_literal(&Value::Null(QKind::Symbol)).unwrap(), "`");
    }

    #[test]
    fn vector_literals() {
        assert_eq!(
            render_literal(&Value::Vector(Vector::longs(vec![1, 2, 3]))).unwrap(),
            "1 2 3"
        );
        assert_eq!(
            render_literal(&Value::Vector(Vector::symbols(vec![
                "a".into(),
                "b".into()
            ])))
            .unwrap(),
            "`a`b"
        );
        assert_eq!(
            render_literal(&Value::Vector(Vector::booleans(vec![true, false, true])))
                .unwrap(),
            "101b"
        );
        assert_eq!(
            render_literal(&Value::List(vec![Value::Long(1), Value::symbol("a")])).unwrap(),
            "(1;`a)"
        );
        assert_eq!(render_literal(&Value::List(vec![])).unwrap(), "()");
    }

    #[test]
    fn where_clause_shapes() {
        assert_eq!(compile_where(&[]).unwrap(), "()");
        assert_eq!(
            compile_where(&[col("price").gt(100i64)]).unwrap(),
            "enlist ((price>100))"
        );
        assert_eq!(
            compile_where(&[col("price").gt(100i64), col("sym").eq("AAPL")]).unwrap(),
            "enlist ((price>100);(sym=`AAPL))"
        );
    }

    #[test]
    fn dictionary_shapes() {
        assert_eq!(compile_dict(&[]), "()");
        assert_eq!(
            compile_dict(&[("sym".into(), "`sym".into())]),
            "(enlist `sym)!enlist `sym"
        );
        assert_eq!(
            compile_dict(&[
                ("sym".into(), "`sym".into()),
                ("avg_price".into(), "(avg price)".into())
            ]),
            "`sym`avg_price!(`sym;(avg price))"
        );
    }

    #[test]
    fn functional_select_full_shape() {
        let compiled = compile_functional_select(
            "trade",
            &[col("price").gt(100i64)],
            &[(None, col("sym"))],
            &[
                (None, col("sym")),
                (Some("avg_price".into()), avg(col("price"))),
            ],
        )
        .unwrap();
        assert_eq!(
            compiled,
            "?[trade;enlist ((price>100));(enlist `sym)!enlist `sym;`sym`avg_price!(`sym;(avg price))]"
        );
    }

    #[test]
    fn alias_inference() {
        let entries =
            projection_entries(&[(None, avg(col("price"))), (None, count())]).unwrap();
        assert_eq!(entries[0].0, "avg_price");
        assert_eq!(entries[1].0, "count");
        assert_eq!(entries[1].1, "(count i)");
    }

    #[test]
    fn exec_column_shapes() {
        assert_eq!(
            compile_exec_columns(&[(None, col("price"))]).unwrap(),
            "`price"
        );
        assert_eq!(
            compile_exec_columns(&[(None, avg(col("price")))]).unwrap(),
            "avg price"
        );
        assert_eq!(
            compile_exec_columns(&[(None, col("sym")), (None, col("price"))]).unwrap(),
            "`sym`price!(`sym;`price)"
        );
    }

    #[test]
    fn delete_forms() {
        assert_eq!(
            compile_functional_delete("trade", &[col("sym").eq("AAPL")], None).unwrap(),
            "![trade;enlist ((sym=`AAPL));0b;()]"
        );
        assert_eq!(
            compile_functional_delete("trade", &[], Some(&["price".into(), "size".into()]))
                .unwrap(),
            "![trade;();0b;`price`size]"
        );
        assert!(compile_functional_delete(
            "trade",
            &[col("sym").eq("AAPL")],
            Some(&["price".into()])
        )
        .is_err());
    }

    #[test]
    fn paging_composes() {
        let base = "?[t;();0b;()]".to_string();
        assert_eq!(apply_paging(base.clone(), Some(10), None), "10#(?[t;();0b;()])");
        assert_eq!(apply_paging(base.clone(), None, Some(5)), "5_(?[t;();0b;()])");
        assert_eq!(
            apply_paging(base, Some(10), Some(5)),
            "10#(5_(?[t;();0b;()]))"
        );
    }

    #[test]
    fn update_assignments_parenthesize_expressions() {
        let compiled = compile_functional_update(
            "trade",
            &[col("sym").eq("AAPL")],
            &[],
            &[("price".into(), col("price") * lit(1.1))],
        )
        .unwrap();
        assert_eq!(
            compiled,
            "![trade;enlist ((sym=`AAPL));0b;(enlist `price)!enlist (price*1.1)]"
        );
    }

    #[test]
    fn by_with_expression_group() {
        let compiled = compile_by(&[(
            Some("bucket".into()),
            xbar(lit(5i64), col("size")),
        )])
        .unwrap();
        assert_eq!(compiled, "(enlist `bucket)!enlist (5 xbar size)");
    }

    #[test]
    fn fby_and_max_in_predicates() {
        let predicate = col("price").eq(fby("max", col("price"), col("sym")));
        assert_eq!(c(&predicate), "(price=((max;price) fby sym))");
        let _ = max(col("price"));
    }
}
