//! Benchmarks for the template engine
//!
//! Run with: cargo bench --bench template
//!
//! Benchmarks cover:
//! - Lexing (tokenization)
//! - Parsing (AST generation)
//! - Rendering a parsed template
//! - Host objects through adapters

use cannelle::lexer::tokenize;
use cannelle::{Environment, Members, Object, RenderOptions, Template, Value};
use divan::{Bencher, black_box};
use facet_value::{VArray, VObject, VString};
use std::sync::Arc;

fn main() {
    divan::main();
}

// ============================================================================
// Template generators
// ============================================================================

/// Simple template with just text
fn simple_text() -> &'static str {
    "Hello, World! This is a simple static text template."
}

/// Template with variable interpolation
fn with_variables() -> &'static str {
    r#"Hello, {{ name | capitalize }}! Welcome to {{ site_name }}.
Your account was created on {{ created_date }}.
You have {{ message_count | plus: 1 }} unread messages."#
}

/// Template with conditionals
fn with_conditionals() -> &'static str {
    r#"{% if user.is_admin and user.active %}
  <div class="admin-panel">Admin Controls</div>
{% elsif user.is_moderator or user.karma > 100 %}
  <div class="mod-panel">Moderator Controls</div>
{% else %}
  <div class="user-panel">User Controls</div>
{% endif %}"#
}

/// Product table, the kind of page a shop renders
fn product_table() -> &'static str {
    r#"<table>
{%- tablerow product in products cols:4 %}
  {%- assign total = product.price | times: 1.2 %}
  <b>{{ product.name | upcase }}</b> {{ total }}
  {%- if product.price > 50 %} (premium){% endif %}
{%- endtablerow %}
</table>"#
}

fn large_table_template(rows: usize) -> String {
    format!(
        "{{% tablerow n in (1..{rows}) cols:10 %}}{{{{ n | times: 2 }}}}{{% if n == 3 %}}!{{% endif %}}{{% endtablerow %}}"
    )
}

// ============================================================================
// Data builders
// ============================================================================

fn simple_data() -> Value {
    [
        ("name", Value::from("alice")),
        ("site_name", Value::from("My Site")),
        ("created_date", Value::from("2024-01-15")),
        ("message_count", Value::from(42)),
    ]
    .into_iter()
    .collect()
}

fn user_data() -> Value {
    let user: Value = [
        ("is_admin", Value::from(false)),
        ("active", Value::from(true)),
        ("is_moderator", Value::from(false)),
        ("karma", Value::from(250)),
    ]
    .into_iter()
    .collect();
    [("user", user)].into_iter().collect()
}

/// Products arrive as dynamic data, the way they would from a config file
fn product_data(count: usize) -> Value {
    let products: Vec<facet_value::Value> = (0..count)
        .map(|i| {
            let mut item = VObject::new();
            item.insert(
                VString::from("name"),
                facet_value::Value::from(format!("Item {i}").as_str()),
            );
            item.insert(
                VString::from("price"),
                facet_value::Value::from(i as f64 * 9.99),
            );
            facet_value::Value::from(item)
        })
        .collect();
    let mut root = VObject::new();
    root.insert(
        VString::from("products"),
        facet_value::Value::from(VArray::from_iter(products)),
    );
    Value::from(facet_value::Value::from(root))
}

struct Product {
    name: String,
    price: f64,
}

impl Object for Product {
    fn describe(members: &mut Members<Self>) {
        members
            .member("name", |p: &Product| p.name.clone())
            .member("price", |p: &Product| p.price);
    }
}

fn product_objects(count: usize) -> Value {
    let products: Vec<Value> = (0..count)
        .map(|i| {
            Value::object(Product {
                name: format!("Item {i}"),
                price: i as f64 * 9.99,
            })
        })
        .collect();
    [("products", Value::from(products))].into_iter().collect()
}

fn compile(source: &str) -> Template {
    let env = Arc::new(Environment::new());
    Template::parse(&env, "bench", source).unwrap()
}

// ============================================================================
// Lexer benchmarks
// ============================================================================

#[divan::bench]
fn lex_simple(bencher: Bencher) {
    let source = simple_text();
    bencher.bench(|| tokenize(black_box(source)));
}

#[divan::bench]
fn lex_with_variables(bencher: Bencher) {
    let source = with_variables();
    bencher.bench(|| tokenize(black_box(source)));
}

#[divan::bench]
fn lex_product_table(bencher: Bencher) {
    let source = product_table();
    bencher.bench(|| tokenize(black_box(source)));
}

// ============================================================================
// Parser benchmarks
// ============================================================================

#[divan::bench]
fn parse_simple(bencher: Bencher) {
    let env = Arc::new(Environment::new());
    let source = simple_text();
    bencher.bench(|| Template::parse(&env, "bench", black_box(source)));
}

#[divan::bench]
fn parse_with_conditionals(bencher: Bencher) {
    let env = Arc::new(Environment::new());
    let source = with_conditionals();
    bencher.bench(|| Template::parse(&env, "bench", black_box(source)));
}

#[divan::bench]
fn parse_product_table(bencher: Bencher) {
    let env = Arc::new(Environment::new());
    let source = product_table();
    bencher.bench(|| Template::parse(&env, "bench", black_box(source)));
}

// ============================================================================
// Render benchmarks
// ============================================================================

#[divan::bench]
fn render_simple(bencher: Bencher) {
    let template = compile(simple_text());
    let options = RenderOptions::default();
    bencher.bench(|| black_box(template.render(Value::Nil, &options)));
}

#[divan::bench]
fn render_with_variables(bencher: Bencher) {
    let template = compile(with_variables());
    let options = RenderOptions::default();
    bencher.bench(|| black_box(template.render(simple_data(), &options)));
}

#[divan::bench]
fn render_with_conditionals(bencher: Bencher) {
    let template = compile(with_conditionals());
    let options = RenderOptions::default();
    bencher.bench(|| black_box(template.render(user_data(), &options)));
}

#[divan::bench]
fn render_product_table_hashes(bencher: Bencher) {
    let template = compile(product_table());
    let options = RenderOptions::default();
    let data = product_data(20);
    bencher.bench(|| black_box(template.render(data.clone(), &options)));
}

#[divan::bench]
fn render_product_table_objects(bencher: Bencher) {
    let template = compile(product_table());
    let options = RenderOptions::default();
    let data = product_objects(20);
    bencher.bench(|| black_box(template.render(data.clone(), &options)));
}

// ============================================================================
// Scaling benchmarks
// ============================================================================

#[divan::bench(args = [10, 100, 1000])]
fn render_table_scaling(bencher: Bencher, rows: usize) {
    let template = compile(&large_table_template(rows));
    let options = RenderOptions::default();
    bencher.bench(|| black_box(template.render(Value::Nil, &options)));
}

#[divan::bench(args = [10, 100, 1000])]
fn render_object_scaling(bencher: Bencher, count: usize) {
    let template = compile(product_table());
    let options = RenderOptions::default();
    let data = product_objects(count);
    bencher.bench(|| black_box(template.render(data.clone(), &options)));
}
