//! Benchmarks for the hot paths of the auth subsystem: permission
//! evaluation and session validation run once per inbound operation.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use auth::credentials::ValidatedCredential;
use auth::permission::{self, AccessLevel, PermissionRule, RequestContext};
use auth::rate_limit::{RateLimitConfig, RateLimiter};
use auth::security;
use auth::session::SessionManager;
use chrono::Duration;

fn bench_permission_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("permission");

    group.bench_function("evaluate_no_rules", |b| {
        b.iter(|| {
            permission::evaluate(
                black_box(AccessLevel::ReadWrite),
                black_box("update_mailbox"),
                None,
                &[],
            )
        })
    });

    let rules: Vec<PermissionRule> = (0..32)
        .map(|i| PermissionRule::new(format!("resource-{}", i), ["list", "get", "update"]))
        .collect();
    let ctx = RequestContext::new("resource-31");
    group.bench_function("evaluate_32_rules", |b| {
        b.iter(|| {
            permission::evaluate(
                black_box(AccessLevel::ReadWrite),
                black_box("update"),
                Some(&ctx),
                &rules,
            )
        })
    });

    group.finish();
}

fn bench_token_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("security");

    group.bench_function("generate_secure_token", |b| {
        b.iter(|| security::generate_secure_token(black_box(security::TOKEN_BYTES)))
    });

    group.bench_function("fingerprint", |b| {
        b.iter(|| security::fingerprint(black_box("some-api-key-material-0123456789")))
    });

    group.finish();
}

fn bench_session_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("session");

    let credential = ValidatedCredential {
        fingerprint: security::fingerprint("bench-credential"),
        access_level: AccessLevel::ReadWrite,
        allowed_from: Vec::new(),
    };

    let manager = SessionManager::new(Duration::seconds(900), 10_000);
    let grant = manager.create(&credential).unwrap();
    group.bench_function("validate", |b| {
        b.iter(|| manager.validate(black_box(&grant.token)))
    });

    group.bench_function("create_and_revoke", |b| {
        b.iter(|| {
            let grant = manager.create(&credential).unwrap();
            manager.revoke(&grant.token)
        })
    });

    group.finish();
}

fn bench_rate_limiter(c: &mut Criterion) {
    let limiter = RateLimiter::new(RateLimitConfig {
        max_requests: u32::MAX,
        window: Duration::seconds(60),
    });

    c.bench_function("rate_limit_check", |b| {
        b.iter(|| limiter.check(black_box("bench-identifier")))
    });
}

criterion_group!(
    benches,
    bench_permission_evaluation,
    bench_token_generation,
    bench_session_operations,
    bench_rate_limiter,
);
criterion_main!(benches);
