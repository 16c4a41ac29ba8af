//! Benchmarks for request validation
//!
//! Run with: cargo bench

use criterion::{Criterion, criterion_group, criterion_main};
use mcp_ssh_inspector::config::{PolicyConfig, PolicyMode};
use mcp_ssh_inspector::domain::parse_target;
use mcp_ssh_inspector::security::{CommandPolicy, validate_command, validate_path};
use std::hint::black_box;

fn create_strict_config() -> PolicyConfig {
    PolicyConfig {
        mode: PolicyMode::Strict,
        allow: vec![
            r"^ls\b".to_string(),
            r"^pwd$".to_string(),
            r"^cat\s+".to_string(),
            r"^grep\s+".to_string(),
            r"^docker\s+".to_string(),
        ],
        deny: vec![r"^rm\s+-rf".to_string()],
    }
}

fn benchmark_command_validation(c: &mut Criterion) {
    c.bench_function("command: simple (ls -la)", |b| {
        b.iter(|| validate_command(black_box("ls -la")));
    });

    c.bench_function("command: quoted (docker run)", |b| {
        b.iter(|| {
            validate_command(black_box(
                "docker run --rm -v /data:/data alpine sh -c 'echo \"test\"'",
            ))
        });
    });

    let long = "echo ".to_string() + &"word ".repeat(200);
    c.bench_function("command: 200 tokens", |b| {
        b.iter(|| validate_command(black_box(&long)));
    });

    c.bench_function("command: unbalanced quote", |b| {
        b.iter(|| validate_command(black_box("echo 'never closed")));
    });
}

fn benchmark_policy(c: &mut Criterion) {
    let permissive = CommandPolicy::new(&PolicyConfig::default());
    let strict = CommandPolicy::new(&create_strict_config());

    let Ok(grep) = validate_command("grep -r TODO /srv/app") else {
        return;
    };
    let Ok(dangerous) = validate_command("rm -rf /") else {
        return;
    };

    c.bench_function("policy: permissive allowed", |b| {
        b.iter(|| permissive.check(black_box(&grep)));
    });

    c.bench_function("policy: permissive denied", |b| {
        b.iter(|| permissive.check(black_box(&dangerous)));
    });

    c.bench_function("policy: strict allowed", |b| {
        b.iter(|| strict.check(black_box(&grep)));
    });
}

fn benchmark_paths_and_targets(c: &mut Criterion) {
    c.bench_function("path: absolute", |b| {
        b.iter(|| validate_path(black_box("/var/log/nginx/access.log")));
    });

    c.bench_function("path: needs normalizing", |b| {
        b.iter(|| validate_path(black_box("/var//log/./nginx///")));
    });

    c.bench_function("path: traversal", |b| {
        b.iter(|| validate_path(black_box("/var/log/../../etc/shadow")));
    });

    c.bench_function("target: host and path", |b| {
        b.iter(|| parse_target(black_box("db1:/etc/hosts")));
    });
}

criterion_group!(
    benches,
    benchmark_command_validation,
    benchmark_policy,
    benchmark_paths_and_targets
);
criterion_main!(benches);
