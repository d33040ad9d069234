//! 结果表模型
//!
//! 列名即契约（下游分析脚本按列名读取），列顺序固定输出但不具语义。

use serde_json::{Map, Value};

/// 单元格
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Count(usize),
    Text(String),
}

impl Cell {
    /// JSON值：NaN/无穷写为null
    pub fn to_json(&self) -> Value {
        match self {
            Cell::Number(v) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Cell::Count(n) => Value::from(*n),
            Cell::Text(s) => Value::String(s.clone()),
        }
    }
}

/// 通用二维结果表
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl ResultTable {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// 追加一行，单元格数必须与列数一致
    pub fn push_row(&mut self, row: Vec<Cell>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    #[inline]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[inline]
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// 按列名取单元格
    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let index = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(index))
    }

    /// 转为JSON对象数组（每行一个对象）
    pub fn to_json(&self) -> Value {
        Value::Array(
            self.rows
                .iter()
                .map(|row| {
                    let object: Map<String, Value> = self
                        .columns
                        .iter()
                        .cloned()
                        .zip(row.iter().map(Cell::to_json))
                        .collect();
                    Value::Object(object)
                })
                .collect(),
        )
    }
}
