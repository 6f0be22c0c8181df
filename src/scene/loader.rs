use std::path::Path;

use anyhow::{ensure, Context, Result};
use glam::Vec3;

use crate::renderer::material::Material;
use crate::renderer::mesh::{Mesh, SubmeshData};
use crate::renderer::primitives;
use crate::renderer::texture::Texture;
use crate::scene::{Handle, Model, Scene};

/// Imports a glTF file as one model: every primitive of every mesh becomes
/// a submesh of a single shared-buffer mesh, with its material alongside.
pub fn load_gltf(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    scene: &mut Scene,
    path: impl AsRef<Path>,
) -> Result<Handle<Model>> {
    let path = path.as_ref();
    log::info!("Loading model: {:?}", path);
    let (document, buffers, images) =
        gltf::import(path).with_context(|| format!("importing {path:?}"))?;

    let mut textures: Vec<Handle<Texture>> = Vec::with_capacity(images.len());
    for (index, image) in images.iter().enumerate() {
        let rgba = to_rgba8(image)
            .with_context(|| format!("image {index} of {path:?} has an unsupported format"))?;
        textures.push(scene.textures.insert(Texture::from_rgba8(
            device,
            queue,
            &rgba,
            image.width,
            image.height,
            Some(&format!("{path:?}#{index}")),
        )));
    }

    let mut materials: Vec<Handle<Material>> = Vec::new();
    for source in document.materials() {
        let name = source.name().unwrap_or("unnamed");
        let mut material = Material::plain(name);
        let pbr = source.pbr_metallic_roughness();
        let base = pbr.base_color_factor();
        material.albedo = Vec3::new(base[0], base[1], base[2]);
        material.smoothness = 1.0 - pbr.roughness_factor();
        let emissive = source.emissive_factor();
        material.emissive = Vec3::from_array(emissive);
        if let Some(info) = pbr.base_color_texture() {
            material.albedo_texture = Some(textures[info.texture().source().index()]);
        }
        if let Some(info) = source.emissive_texture() {
            material.emissive_texture = Some(textures[info.texture().source().index()]);
        }
        if let Some(info) = source.normal_texture() {
            material.normals_texture = Some(textures[info.texture().source().index()]);
        }
        materials.push(scene.materials.insert(material));
    }

    let mut parts: Vec<SubmeshData> = Vec::new();
    let mut part_materials: Vec<Handle<Material>> = Vec::new();
    for mesh in document.meshes() {
        for primitive in mesh.primitives() {
            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

            let positions: Vec<[f32; 3]> = reader
                .read_positions()
                .context("primitive has no positions")?
                .collect();
            let normals: Vec<[f32; 3]> = match reader.read_normals() {
                Some(iter) => iter.collect(),
                None => vec![[0.0, 1.0, 0.0]; positions.len()],
            };
            let uvs: Vec<[f32; 2]> = match reader.read_tex_coords(0) {
                Some(iter) => iter.into_f32().collect(),
                None => vec![[0.0, 0.0]; positions.len()],
            };
            let tangents: Vec<[f32; 4]> = match reader.read_tangents() {
                Some(iter) => iter.collect(),
                None => vec![[1.0, 0.0, 0.0, 1.0]; positions.len()],
            };
            ensure!(
                normals.len() == positions.len()
                    && uvs.len() == positions.len()
                    && tangents.len() == positions.len(),
                "primitive attribute streams disagree on vertex count"
            );

            let mut vertices = Vec::with_capacity(positions.len() * 14);
            for i in 0..positions.len() {
                let normal = Vec3::from_array(normals[i]);
                let tangent = Vec3::new(tangents[i][0], tangents[i][1], tangents[i][2]);
                let bitangent = normal.cross(tangent) * tangents[i][3];
                vertices.extend_from_slice(&positions[i]);
                vertices.extend_from_slice(&normals[i]);
                vertices.extend_from_slice(&uvs[i]);
                vertices.extend_from_slice(&tangent.to_array());
                vertices.extend_from_slice(&bitangent.to_array());
            }

            let indices: Vec<u32> = match reader.read_indices() {
                Some(iter) => iter.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };

            parts.push(SubmeshData {
                layout: primitives::geometry_layout(),
                vertices,
                indices,
            });
            part_materials.push(
                primitive
                    .material()
                    .index()
                    .map(|i| materials[i])
                    .unwrap_or(scene.builtins.default_material),
            );
        }
    }

    let label = path.to_string_lossy();
    let mesh = scene.meshes.insert(Mesh::new(device, &label, parts)?);
    Ok(scene.models.insert(Model {
        mesh,
        materials: part_materials,
    }))
}

fn to_rgba8(image: &gltf::image::Data) -> Option<Vec<u8>> {
    use gltf::image::Format;
    let pixels = (image.width * image.height) as usize;
    match image.format {
        Format::R8G8B8A8 => Some(image.pixels.clone()),
        Format::R8G8B8 => {
            let mut out = Vec::with_capacity(pixels * 4);
            for rgb in image.pixels.chunks_exact(3) {
                out.extend_from_slice(rgb);
                out.push(255);
            }
            Some(out)
        }
        Format::R8 => {
            let mut out = Vec::with_capacity(pixels * 4);
            for &r in &image.pixels {
                out.extend_from_slice(&[r, r, r, 255]);
            }
            Some(out)
        }
        _ => None,
    }
}
