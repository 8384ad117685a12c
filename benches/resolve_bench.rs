//! Resolution benchmarks: exact hits, glob matches, inheritance-chain
//! fallback, and multi-role queries over graphs of increasing width.

use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Runtime;

use hrbac::{Params, Rbac, RoleDef, RoleDefinitions, When};

/// `width` sibling roles plus a three-level reporting chain.
fn build_definitions(width: usize) -> RoleDefinitions {
    let mut defs: RoleDefinitions = (0..width)
        .map(|i| {
            (
                format!("team-{i}"),
                RoleDef::new()
                    .allow(format!("team{i}:read"))
                    .allow(format!("team{i}:*")),
            )
        })
        .collect();

    defs.insert(
        "user".to_string(),
        RoleDef::new()
            .allow("post:add")
            .allow("account:*")
            .allow_when("post:save", When::new(|p: &Params| {
                p.get("ownerId") == p.get("postId")
            })),
    );
    defs.insert(
        "manager".to_string(),
        RoleDef::new().allow("post:delete").inherit("user"),
    );
    defs.insert(
        "admin".to_string(),
        RoleDef::new().allow("user:*").inherit("manager"),
    );
    defs
}

fn bench_resolution(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("resolution");

    for width in [10, 100, 1000] {
        let rbac = Rbac::new(build_definitions(width)).unwrap();

        group.bench_with_input(BenchmarkId::new("exact_hit", width), &rbac, |b, rbac| {
            b.iter(|| {
                rt.block_on(async {
                    black_box(rbac.can("user", "post:add", None).await.unwrap())
                })
            })
        });

        group.bench_with_input(BenchmarkId::new("glob_match", width), &rbac, |b, rbac| {
            b.iter(|| {
                rt.block_on(async {
                    black_box(rbac.can("user", "account:save", None).await.unwrap())
                })
            })
        });

        group.bench_with_input(
            BenchmarkId::new("inheritance_chain", width),
            &rbac,
            |b, rbac| {
                b.iter(|| {
                    rt.block_on(async {
                        black_box(rbac.can("admin", "post:add", None).await.unwrap())
                    })
                })
            },
        );

        group.bench_with_input(
            BenchmarkId::new("multi_role_miss", width),
            &rbac,
            |b, rbac| {
                b.iter(|| {
                    rt.block_on(async {
                        black_box(
                            rbac.can(vec!["team-0", "team-1", "user"], "post:add", None)
                                .await
                                .unwrap(),
                        )
                    })
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_resolution);
criterion_main!(benches);
