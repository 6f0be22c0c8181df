use std::f32::consts::{PI, TAU};

use crate::renderer::mesh::{SubmeshData, VertexBufferAttribute, VertexBufferLayout};

/// Layout for the full geometry vertex: position, normal, uv, tangent,
/// bitangent. 14 floats, 56 bytes per vertex.
pub fn geometry_layout() -> VertexBufferLayout {
    VertexBufferLayout {
        attributes: vec![
            VertexBufferAttribute { location: 0, components: 3, offset: 0 },
            VertexBufferAttribute { location: 1, components: 3, offset: 12 },
            VertexBufferAttribute { location: 2, components: 2, offset: 24 },
            VertexBufferAttribute { location: 3, components: 3, offset: 32 },
            VertexBufferAttribute { location: 4, components: 3, offset: 44 },
        ],
        stride: 56,
    }
}

/// Layout for post-process vertices: position and uv only, 20 bytes.
pub fn screen_quad_layout() -> VertexBufferLayout {
    VertexBufferLayout {
        attributes: vec![
            VertexBufferAttribute { location: 0, components: 3, offset: 0 },
            VertexBufferAttribute { location: 1, components: 2, offset: 12 },
        ],
        stride: 20,
    }
}

/// Layout for light volumes: position only, 12 bytes.
pub fn position_only_layout() -> VertexBufferLayout {
    VertexBufferLayout {
        attributes: vec![VertexBufferAttribute { location: 0, components: 3, offset: 0 }],
        stride: 12,
    }
}

/// Full-screen quad in clip space, two triangles.
pub fn screen_quad() -> SubmeshData {
    #[rustfmt::skip]
    let vertices = vec![
        -1.0, -1.0, 0.0,  0.0, 0.0,
         1.0, -1.0, 0.0,  1.0, 0.0,
         1.0,  1.0, 0.0,  1.0, 1.0,
        -1.0,  1.0, 0.0,  0.0, 1.0,
    ];
    SubmeshData {
        layout: screen_quad_layout(),
        vertices,
        indices: vec![0, 1, 2, 0, 2, 3],
    }
}

/// Unit plane on the XZ axes, facing +Y, spanning [-half, half].
pub fn plane(half: f32) -> SubmeshData {
    let mut vertices = Vec::with_capacity(4 * 14);
    #[rustfmt::skip]
    let corners: [([f32; 3], [f32; 2]); 4] = [
        ([-half, 0.0,  half], [0.0, 0.0]),
        ([ half, 0.0,  half], [1.0, 0.0]),
        ([ half, 0.0, -half], [1.0, 1.0]),
        ([-half, 0.0, -half], [0.0, 1.0]),
    ];
    for (position, uv) in corners {
        vertices.extend_from_slice(&position);
        vertices.extend_from_slice(&[0.0, 1.0, 0.0]);
        vertices.extend_from_slice(&uv);
        vertices.extend_from_slice(&[1.0, 0.0, 0.0]);
        vertices.extend_from_slice(&[0.0, 0.0, -1.0]);
    }
    SubmeshData {
        layout: geometry_layout(),
        vertices,
        indices: vec![0, 1, 2, 0, 2, 3],
    }
}

const SPHERE_SLICES: u32 = 64;
const SPHERE_STACKS: u32 = 32;

/// Unit UV sphere, 64 slices by 32 stacks. Doubles as the point-light
/// volume, scaled to the light's range at draw time.
pub fn sphere() -> SubmeshData {
    let mut vertices = Vec::new();
    for stack in 0..=SPHERE_STACKS {
        let v = stack as f32 / SPHERE_STACKS as f32;
        let phi = v * PI;
        for slice in 0..=SPHERE_SLICES {
            let u = slice as f32 / SPHERE_SLICES as f32;
            let theta = u * TAU;

            let x = phi.sin() * theta.cos();
            let y = phi.cos();
            let z = phi.sin() * theta.sin();

            // tangent follows increasing theta, bitangent increasing phi
            let tangent = [-theta.sin(), 0.0, theta.cos()];
            let bitangent = [
                phi.cos() * theta.cos(),
                -phi.sin(),
                phi.cos() * theta.sin(),
            ];

            vertices.extend_from_slice(&[x, y, z]);
            vertices.extend_from_slice(&[x, y, z]);
            vertices.extend_from_slice(&[u, 1.0 - v]);
            vertices.extend_from_slice(&tangent);
            vertices.extend_from_slice(&bitangent);
        }
    }

    let ring = SPHERE_SLICES + 1;
    let mut indices = Vec::new();
    for stack in 0..SPHERE_STACKS {
        for slice in 0..SPHERE_SLICES {
            let a = stack * ring + slice;
            let b = a + ring;
            indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
        }
    }

    SubmeshData {
        layout: geometry_layout(),
        vertices,
        indices,
    }
}

/// Light-volume sphere carrying positions only, for the point-light pass.
pub fn light_sphere() -> SubmeshData {
    let full = sphere();
    let stride = 14;
    let vertices = full
        .vertices
        .chunks_exact(stride)
        .flat_map(|v| v[..3].to_vec())
        .collect();
    SubmeshData {
        layout: position_only_layout(),
        vertices,
        indices: full.indices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_layout_is_valid() {
        geometry_layout().validate().unwrap();
        assert_eq!(geometry_layout().stride, 56);
    }

    #[test]
    fn quad_vertex_count_matches_layout() {
        let quad = screen_quad();
        let floats_per_vertex = quad.layout.stride as usize / 4;
        assert_eq!(quad.vertices.len() % floats_per_vertex, 0);
        assert_eq!(quad.vertices.len() / floats_per_vertex, 4);
        assert_eq!(quad.indices.len(), 6);
    }

    #[test]
    fn sphere_is_closed() {
        let sphere = sphere();
        let floats_per_vertex = sphere.layout.stride as usize / 4;
        let vertex_count = (sphere.vertices.len() / floats_per_vertex) as u32;
        assert_eq!(vertex_count, (SPHERE_SLICES + 1) * (SPHERE_STACKS + 1));
        assert_eq!(
            sphere.indices.len() as u32,
            SPHERE_SLICES * SPHERE_STACKS * 6
        );
        assert!(sphere.indices.iter().all(|&i| i < vertex_count));
    }

    #[test]
    fn sphere_vertices_are_unit_length() {
        let sphere = sphere();
        for vertex in sphere.vertices.chunks_exact(14) {
            let len_sq = vertex[0] * vertex[0] + vertex[1] * vertex[1] + vertex[2] * vertex[2];
            assert!((len_sq - 1.0).abs() < 1e-4);
        }
    }
}
