//! Read benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::DVec3;
use tile_core::QPoint3dList;
use tile_gltf::{GltfInput, GltfReadOptions, GltfReader};

const GRID: usize = 128;

/// A GLB holding a `GRID` x `GRID` vertex height field.
fn grid_glb() -> Vec<u8> {
    let mut positions = Vec::with_capacity(GRID * GRID * 3);
    for y in 0..GRID {
        for x in 0..GRID {
            positions.extend_from_slice(&[x as f32, ((x * y) % 17) as f32 * 0.1, y as f32]);
        }
    }
    let mut indices = Vec::with_capacity((GRID - 1) * (GRID - 1) * 6);
    for y in 0..GRID - 1 {
        for x in 0..GRID - 1 {
            let i = (y * GRID + x) as u32;
            let row = GRID as u32;
            indices.extend_from_slice(&[i, i + 1, i + row + 1, i, i + row + 1, i + row]);
        }
    }

    let mut bin = Vec::new();
    bin.extend_from_slice(bytemuck::cast_slice(&positions));
    let index_offset = bin.len();
    bin.extend_from_slice(bytemuck::cast_slice(&indices));

    let json = serde_json::json!({
        "asset": {"version": "2.0"},
        "buffers": [{"byteLength": bin.len()}],
        "bufferViews": [
            {"buffer": 0, "byteOffset": 0, "byteLength": index_offset},
            {"buffer": 0, "byteOffset": index_offset, "byteLength": bin.len() - index_offset}
        ],
        "accessors": [
            {"bufferView": 0, "componentType": 5126, "count": GRID * GRID, "type": "VEC3"},
            {"bufferView": 1, "componentType": 5125, "count": indices.len(), "type": "SCALAR"}
        ],
        "meshes": [{"primitives": [{"attributes": {"POSITION": 0}, "indices": 1}]}],
        "nodes": [{"mesh": 0}]
    });
    let mut json = serde_json::to_vec(&json).unwrap();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }

    let mut glb = Vec::new();
    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&((12 + 8 + json.len() + 8 + bin.len()) as u32).to_le_bytes());
    glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"JSON");
    glb.extend_from_slice(&json);
    glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"BIN\0");
    glb.extend_from_slice(&bin);
    glb
}

fn read_geometry(c: &mut Criterion) {
    let glb = grid_glb();
    let reader = GltfReader::new(GltfReadOptions::new());
    c.bench_function("read_geometry_grid", |b| {
        b.iter(|| {
            let input = GltfInput::Bytes(black_box(glb.clone()));
            pollster::block_on(reader.read_geometry(input, &|| false))
        })
    });
}

fn quantize_points(c: &mut Criterion) {
    let points: Vec<DVec3> = (0..GRID * GRID)
        .map(|i| DVec3::new((i % GRID) as f64, (i / GRID) as f64, (i % 7) as f64))
        .collect();
    c.bench_function("quantize_points", |b| {
        b.iter(|| QPoint3dList::from_points(black_box(&points)))
    });
}

criterion_group!(benches, read_geometry, quantize_points);
criterion_main!(benches);
