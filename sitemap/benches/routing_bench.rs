//! Benchmarks for request routing.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sitemap::components::{ComponentRegistry, MatchResult, PreparableMatcher, WildcardUriMatcher};
use sitemap::core::Parameters;
use sitemap::environment::Environment;
use sitemap::variables::{MapStack, VariableResolver};

fn wildcard_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    let matcher = WildcardUriMatcher;
    let prepared = matcher.prepare("docs/**/*.html").expect("pattern");
    let env = Environment::new("docs/guide/routing/index.html");
    let params = Parameters::new();

    c.bench_function("wildcard_prepared_match", |b| {
        b.iter(|| {
            runtime.block_on(async {
                black_box(matcher.prepared_match(&prepared, &env, &params).await)
            })
        });
    });
}

fn resolver_benchmark(c: &mut Criterion) {
    let registry = ComponentRegistry::with_builtins();
    let resolver = VariableResolver::parse("{../1}/{#page:1}.{request-param:format}", &registry)
        .expect("expression");
    let env = Environment::new("news/today?format=pdf");
    let mut maps = MapStack::new();
    maps.push(Some("page".to_string()), MatchResult::from([("1".to_string(), "news".to_string())]));
    maps.push(None, MatchResult::from([("1".to_string(), "today".to_string())]));

    c.bench_function("variable_resolve", |b| {
        b.iter(|| black_box(resolver.resolve(&maps, &env)));
    });
}

criterion_group!(benches, wildcard_benchmark, resolver_benchmark);
criterion_main!(benches);
