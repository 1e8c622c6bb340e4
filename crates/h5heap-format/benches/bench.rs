use criterion::{black_box, criterion_group, criterion_main, Criterion};
use h5heap_format::checksum::jenkins_lookup3;
use h5heap_format::fractal_heap::FractalHeapHeader;
use h5heap_format::global_heap::GlobalHeapCollection;
use h5heap_format::heap_id::HeapId;

const DBLOCK_ADDR: usize = 512;
const BLOCK_SIZE: usize = 1024;

fn append_uint(buf: &mut Vec<u8>, val: u64, width: usize) {
    buf.extend_from_slice(&val.to_le_bytes()[..width]);
}

/// A heap whose root is one direct block filled with 32-byte objects.
fn build_heap() -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(b"FRHP");
    buf.push(0);
    buf.extend_from_slice(&7u16.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.push(0);
    buf.extend_from_slice(&512u32.to_le_bytes());
    for _ in 0..2 {
        append_uint(&mut buf, 0, 8);
        append_uint(&mut buf, u64::MAX, 8);
    }
    append_uint(&mut buf, BLOCK_SIZE as u64, 8); // managed space
    append_uint(&mut buf, BLOCK_SIZE as u64, 8); // allocated managed space
    append_uint(&mut buf, 0, 8);
    append_uint(&mut buf, 31, 8); // managed object count
    for _ in 0..4 {
        append_uint(&mut buf, 0, 8);
    }
    buf.extend_from_slice(&4u16.to_le_bytes());
    append_uint(&mut buf, BLOCK_SIZE as u64, 8); // starting block size
    append_uint(&mut buf, BLOCK_SIZE as u64, 8); // max direct block size
    buf.extend_from_slice(&16u16.to_le_bytes());
    buf.extend_from_slice(&2u16.to_le_bytes());
    append_uint(&mut buf, DBLOCK_ADDR as u64, 8);
    buf.extend_from_slice(&0u16.to_le_bytes());
    let sum = jenkins_lookup3(&buf);
    buf.extend_from_slice(&sum.to_le_bytes());

    let mut file = vec![0u8; DBLOCK_ADDR + BLOCK_SIZE];
    file[..buf.len()].copy_from_slice(&buf);
    file[DBLOCK_ADDR..DBLOCK_ADDR + 4].copy_from_slice(b"FHDB");
    for (i, chunk) in file[DBLOCK_ADDR + 15..DBLOCK_ADDR + BLOCK_SIZE]
        .chunks_mut(32)
        .enumerate()
    {
        chunk.fill(i as u8);
    }
    file
}

fn bench_header_parse(c: &mut Criterion) {
    let file = build_heap();
    c.bench_function("parse_fractal_heap_header", |b| {
        b.iter(|| FractalHeapHeader::parse(black_box(&file), 0, 8, 8).unwrap())
    });
}

fn bench_id_decode(c: &mut Criterion) {
    let file = build_heap();
    let hdr = FractalHeapHeader::parse(&file, 0, 8, 8).unwrap();
    let id = HeapId::Managed {
        offset: 47,
        length: 32,
    }
    .encode(&hdr, 8, 8)
    .unwrap();
    c.bench_function("decode_managed_heap_id", |b| {
        b.iter(|| HeapId::decode(black_box(&id), &hdr, 8, 8).unwrap())
    });
}

fn bench_managed_read(c: &mut Criterion) {
    let file = build_heap();
    let hdr = FractalHeapHeader::parse(&file, 0, 8, 8).unwrap();
    let ids: Vec<Vec<u8>> = (0..31)
        .map(|i| {
            HeapId::Managed {
                offset: 15 + i * 32,
                length: 32,
            }
            .encode(&hdr, 8, 8)
            .unwrap()
        })
        .collect();
    c.bench_function("read_31_managed_objects", |b| {
        b.iter(|| {
            for id in &ids {
                black_box(hdr.read_object(&file, id, 8, 8).unwrap());
            }
        })
    });
}

fn bench_global_heap_parse(c: &mut Criterion) {
    let mut gcol = Vec::new();
    gcol.extend_from_slice(b"GCOL");
    gcol.push(1);
    gcol.extend_from_slice(&[0u8; 3]);
    let size_pos = gcol.len();
    append_uint(&mut gcol, 0, 8);
    for i in 1u16..=100 {
        gcol.extend_from_slice(&i.to_le_bytes());
        gcol.extend_from_slice(&1u16.to_le_bytes());
        gcol.extend_from_slice(&[0u8; 4]);
        append_uint(&mut gcol, 24, 8);
        gcol.extend_from_slice(&[i as u8; 24]);
    }
    gcol.extend_from_slice(&[0u8; 16]); // free space marker
    let total = gcol.len() as u64;
    gcol[size_pos..size_pos + 8].copy_from_slice(&total.to_le_bytes());

    c.bench_function("parse_global_heap_100_objects", |b| {
        b.iter(|| GlobalHeapCollection::parse(black_box(&gcol), 0, 8).unwrap())
    });
}

criterion_group!(
    benches,
    bench_header_parse,
    bench_id_decode,
    bench_managed_read,
    bench_global_heap_parse
);
criterion_main!(benches);
