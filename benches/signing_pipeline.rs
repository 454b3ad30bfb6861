//! Signing pipeline benchmarks
//!
//! Run with: cargo bench --bench signing_pipeline

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pdf_seal::config::SigningConfig;
use pdf_seal::signatures::{insert_placeholder, DigestAlgorithm, PdfSigner, PlaceholderOptions, SignerMetadata};

/// One-page document padded with a content stream of `filler` bytes.
fn document(filler: usize) -> Vec<u8> {
    let content = "0 0 m 10 10 l S\n".repeat(filler / 16 + 1);
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R >>".to_string(),
        format!("<< /Length {} >>\nstream\n{}\nendstream", content.len(), content),
    ];

    let mut pdf = b"%PDF-1.7\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    let xref = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    pdf.extend_from_slice(
        format!("trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n", objects.len() + 1, xref).as_bytes(),
    );
    pdf
}

fn bench_insert_placeholder(c: &mut Criterion) {
    let pdf = document(64 * 1024);
    let options = PlaceholderOptions::default();
    c.bench_function("insert_placeholder", |b| {
        b.iter(|| insert_placeholder(black_box(&pdf), &options))
    });
}

fn bench_full_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("sign_with");
    let metadata = SignerMetadata::new().with_name("Bench").with_reason("Throughput");

    for size in [16 * 1024, 1024 * 1024] {
        let pdf = document(size);
        for algorithm in [DigestAlgorithm::Sha256, DigestAlgorithm::Sha512] {
            let signer = PdfSigner::new(SigningConfig::default().with_digest_algorithm(algorithm));
            group.bench_with_input(BenchmarkId::new(algorithm.name(), size), &pdf, |b, pdf| {
                b.iter(|| signer.sign_with(black_box(pdf), &metadata, |digest| Ok(digest.to_vec())))
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_insert_placeholder, bench_full_pipeline);
criterion_main!(benches);
