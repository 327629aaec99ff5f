//! Statement builder example for querykit
//!
//! Run with: cargo run --example builder -p querykit
//!
//! Renders statements only; no database is needed.

use querykit::{
    Builder, BuildError, Column, Delimiter, Direction, JoinType, Operator, Value, WhereClause,
};

fn main() -> Result<(), BuildError> {
    let mut b = Builder::new();

    // ==================== SELECT with nested groups ====================
    b.table("products")
        .and_where("in_stock", Operator::Equal, true)
        .and_group(|g| {
            g.and_where("price", Operator::Between, [10, 100])
                .or_where("category", Operator::In, ["books", "games"]);
        })
        .order_by("price", Direction::Desc)
        .limit(20, 40);
    let stmt = b.select(["id", "name", "price"])?;
    println!("{}\n  params: {:?}\n", stmt.sql, stmt.params);

    // ==================== Aggregates and joins ====================
    b.join("categories", JoinType::Left)
        .join_cond("category_id", "id", Operator::Equal)?
        .join_cols(["title"])?;
    b.group_by("category_id");
    let stmt = b.select([Column::func("count", "id").alias("products")])?;
    println!("{}\n", stmt.sql);

    // ==================== Subquery ====================
    b.and_nested("id", Operator::In, |sub| {
        sub.table("order_items")
            .and_where("created_at", Operator::GreaterEq, "2024-01-01");
        sub.select(["product_id"])
    });
    let stmt = b.select(["name"])?;
    println!("{}\n  params: {:?}\n", stmt.sql, stmt.params);

    // ==================== Writes ====================
    let stmt = b.insert([
        ("name", Value::from("Widget")),
        ("price", Value::Int(25)),
        ("category", Value::Null),
    ])?;
    println!("{}\n  params: {:?}\n", stmt.sql, stmt.params);

    b.and_where("id", Operator::Equal, 7);
    let stmt = b.update([("price", 30)])?;
    println!("{}\n  params: {:?}\n", stmt.sql, stmt.params);
    println!("  postgres: {}\n", stmt.numbered_sql());

    // ==================== MySQL-style quoting ====================
    let mut mysql = Builder::with_delimiter(Delimiter::Backtick);
    mysql.table("products").and_where("deleted_at", Operator::Equal, Value::Null);
    println!("{}", mysql.delete()?.sql);

    Ok(())
}
