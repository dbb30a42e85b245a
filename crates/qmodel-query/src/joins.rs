//! Join builders: as-of, left, inner, and window joins.

use qmodel_core::Result;

/// As-of join: `aj[`c1`c2;left;right]`: each left row matches the
/// greatest right row whose key is less than or equal.
#[derive(Debug, Clone)]
pub struct AsOfJoin {
    on: Vec<String>,
    left: String,
    right: String,
}

/// Left join over a keyed right side: `` left lj `c1`c2 xkey right ``.
#[derive(Debug, Clone)]
pub struct LeftJoin {
    on: Vec<String>,
    left: String,
    right: String,
}

/// Inner join over a keyed right side: `` left ij `c1`c2 xkey right ``.
#[derive(Debug, Clone)]
pub struct InnerJoin {
    on: Vec<String>,
    left: String,
    right: String,
}

/// Window join: aggregates right-side columns within a per-row time
/// window. The last join column is the time column.
#[derive(Debug, Clone)]
pub struct WindowJoin {
    windows: (i64, i64),
    on: Vec<String>,
    left: String,
    right: String,
    aggs: Vec<(String, String)>,
}

fn symbol_run(names: &[String]) -> String {
    names.iter().map(|n| format!("`{n}")).collect()
}

impl AsOfJoin {
    pub fn compile(&self) -> Result<String> {
        Ok(format!(
            "aj[{};{};{}]",
            symbol_run(&self.on),
            self.left,
            self.right
        ))
    }
}

impl LeftJoin {
    pub fn compile(&self) -> Result<String> {
        Ok(format!(
            "{} lj {} xkey {}",
            self.left,
            symbol_run(&self.on),
            self.right
        ))
    }
}

impl InnerJoin {
    pub fn compile(&self) -> Result<String> {
        Ok(format!(
            "{} ij {} xkey {}",
            self.left,
            symbol_run(&self.on),
            self.right
        ))
    }
}

impl WindowJoin {
    /// Add an aggregate over a right-side column, e.g. `("avg", "bid")`.
    pub fn agg(mut self, func: impl Into<String>, column: impl Into<String>) -> Self {
        self.aggs.push((func.into(), column.into()));
        self
    }

    pub fn compile(&self) -> Result<String> {
        let time_col = self.on.last().map(String::as_str).unwrap_or_default();
        let aggs: Vec<String> = self
            .aggs
            .iter()
            .map(|(func, column)| format!("({func};`{column})"))
            .collect();
        let right_part = if aggs.is_empty() {
            format!("({})", self.right)
        } else {
            format!("({};{})", self.right, aggs.join(";"))
        };
        Ok(format!(
            "wj[{} {}+{}.{time_col};{};{};{right_part}]",
            self.windows.0,
            self.windows.1,
            self.left,
            symbol_run(&self.on),
            self.left
        ))
    }
}

fn names(on: &[&str]) -> Vec<String> {
    on.iter().map(|s| s.to_string()).collect()
}

/// As-of join constructor.
pub fn aj(on: &[&str], left: impl Into<String>, right: impl Into<String>) -> AsOfJoin {
    AsOfJoin {
        on: names(on),
        left: left.into(),
        right: right.into(),
    }
}

/// Left join constructor.
pub fn lj(on: &[&str], left: impl Into<String>, right: impl Into<String>) -> LeftJoin {
    LeftJoin {
        on: names(on),
        left: left.into(),
        right: right.into(),
    }
}

/// Inner join constructor.
pub fn ij(on: &[&str], left: impl Into<String>, right: impl Into<String>) -> InnerJoin {
    InnerJoin {
        on: names(on),
        left: left.into(),
        right: right.into(),
    }
}

/// Window join constructor; `windows` are offsets (usually nanoseconds)
/// around each left row's time.
pub fn wj(
    windows: (i64, i64),
    on: &[&str],
    left: impl Into<String>,
    right: impl Into<String>,
) -> WindowJoin {
    WindowJoin {
        windows,
        on: names(on),
        left: left.into(),
        right: right.into(),
        aggs: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_of_join() {
        let compiled = aj(&["sym", "time"], "trade", "quote").compile().unwrap();
        assert_eq!(compiled, "aj[`sym`time;trade;quote]");
    }

    #[test]
    fn left_and_inner_joins_key_the_right_side() {
        assert_eq!(
            lj(&["sym"], "trade", "stats").compile().unwrap(),
            "trade lj `sym xkey stats"
        );
        assert_eq!(
            ij(&["sym", "date"], "trade", "daily").compile().unwrap(),
            "trade ij `sym`date xkey daily"
        );
    }

    #[test]
    fn window_join_with_aggregates() {
        let compiled = wj((-2_000_000_000, 0), &["sym", "time"], "trade", "quote")
            .agg("avg", "bid")
            .agg("avg", "ask")
            .compile()
            .unwrap();
        assert_eq!(
            compiled,
            "wj[-2000000000 0+trade.time;`sym`time;trade;(quote;(avg;`bid);(avg;`ask))]"
        );
    }

    #[test]
    fn window_join_without_aggregates() {
        let compiled = wj((0, 0), &["sym", "time"], "trade", "quote")
            .compile()
            .unwrap();
        assert_eq!(compiled, "wj[0 0+trade.time;`sym`time;trade;(quote)]");
    }
}
