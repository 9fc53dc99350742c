use chrono::{NaiveDate, Utc};
use common::{CartId, Money, ProductId, Properties, VariantId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    CartLine, CatalogVariant, InventoryPolicy, LocalLine, OrderTotals, PriceAdjustments, Product,
    ProductVariant, merge_lines, next_order_number,
};

fn catalog(stock: i64) -> CatalogVariant {
    let product_id = ProductId::new();
    CatalogVariant {
        variant: ProductVariant {
            id: VariantId::new(),
            product_id,
            title: "Default".to_string(),
            sku: None,
            is_active: true,
            price: Money::from_cents(1999),
            inventory_policy: InventoryPolicy::Deny,
            inventory_quantity: stock,
        },
        product: Product {
            id: product_id,
            name: "Bench Widget".to_string(),
            is_active: true,
            brand: None,
            thumbnail: None,
        },
    }
}

fn bench_cart_merge(c: &mut Criterion) {
    let cart_id = CartId::new();
    let catalogs: Vec<CatalogVariant> = (0..50).map(|i| catalog(i % 20)).collect();
    let server: Vec<CartLine> = catalogs
        .iter()
        .step_by(2)
        .map(|cv| CartLine::new(cart_id, cv.variant.id, 3, Properties::new(), Utc::now()).unwrap())
        .collect();
    let local: Vec<LocalLine> = catalogs
        .iter()
        .map(|cv| LocalLine {
            catalog: cv.clone(),
            quantity: 5,
            properties: None,
        })
        .collect();

    c.bench_function("domain/merge_50_lines", |b| {
        b.iter(|| merge_lines(&server, &local));
    });
}

fn bench_order_number(c: &mut Criterion) {
    let day = NaiveDate::from_ymd_opt(2024, 12, 25).unwrap();
    c.bench_function("domain/next_order_number", |b| {
        b.iter(|| next_order_number(day, Some("202412250042")).unwrap());
    });
}

fn bench_totals(c: &mut Criterion) {
    let lines: Vec<(Money, u32)> = (1..=100).map(|i| (Money::from_cents(i * 10), 2)).collect();
    c.bench_function("domain/order_totals_100_lines", |b| {
        b.iter(|| OrderTotals::compute(lines.iter().copied(), PriceAdjustments::default()));
    });
}

criterion_group!(benches, bench_cart_merge, bench_order_number, bench_totals);
criterion_main!(benches);
