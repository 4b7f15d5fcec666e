mod tables;

pub use tables::{Column, ColumnType, ForeignKey, Table, TableGroup};
