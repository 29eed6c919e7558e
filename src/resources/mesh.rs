use std::{
    collections::HashMap,
    io::{BufReader, Cursor},
};

use anyhow::Context as _;

use crate::data_structures::model::{self, MeshData};

/// A material parsed from an MTL file together with the diffuse map it names, if any.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialDef {
    pub material: model::Material,
    pub diffuse_texture: Option<String>,
}

/// Parsed MTL library: the materials in file order plus their name lookup, in the
/// shape the OBJ parser expects back from its material loader.
#[derive(Clone, Debug, Default)]
pub struct MaterialLibrary {
    raw: Vec<tobj::Material>,
    names: HashMap<String, usize>,
}

impl MaterialLibrary {
    pub fn parse(mtl_text: &str) -> anyhow::Result<Self> {
        let (raw, names) = tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(mtl_text)))
            .context("malformed material library")?;
        Ok(Self {
            raw,
            names: names.into_iter().collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Converts every entry into a scene material.
    pub fn definitions(&self) -> Vec<MaterialDef> {
        self.raw
            .iter()
            .map(|m| {
                let mut material =
                    model::Material::colored(&m.name, m.diffuse.unwrap_or([1.0, 1.0, 1.0]));
                if let Some(ke) = m.emissive {
                    material.emissive = ke;
                }
                MaterialDef {
                    material,
                    diffuse_texture: m.diffuse_texture.clone(),
                }
            })
            .collect()
    }
}

/// Parses OBJ text into meshes. `usemtl` statements are resolved against `library`
/// regardless of the file name the OBJ's `mtllib` line gives.
pub fn parse_obj(obj_text: &str, library: &MaterialLibrary) -> anyhow::Result<Vec<MeshData>> {
    let mut reader = BufReader::new(Cursor::new(obj_text));
    let (models, _) = tobj::load_obj_buf(
        &mut reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |_| Ok((library.raw.clone(), library.names.clone().into_iter().collect())),
    )
    .context("malformed geometry")?;

    let meshes: Vec<MeshData> = models
        .iter()
        .map(|m| to_mesh(m))
        .filter(|mesh| !mesh.indices.is_empty())
        .collect();
    anyhow::ensure!(!meshes.is_empty(), "geometry contains no faces");
    Ok(meshes)
}

fn to_mesh(m: &tobj::Model) -> MeshData {
    let mut vertices = (0..m.mesh.positions.len() / 3)
        .map(|i| model::ModelVertex {
            position: [
                m.mesh.positions[i * 3],
                m.mesh.positions[i * 3 + 1],
                m.mesh.positions[i * 3 + 2],
            ],
            tex_coords: [
                m.mesh.texcoords.get(i * 2).map_or(0.0, |f| *f),
                1.0 - m.mesh.texcoords.get(i * 2 + 1).map_or(0.0, |f| *f),
            ],
            normal: [
                m.mesh.normals.get(i * 3).map_or(0.0, |f| *f),
                m.mesh.normals.get(i * 3 + 1).map_or(0.0, |f| *f),
                m.mesh.normals.get(i * 3 + 2).map_or(0.0, |f| *f),
            ],
        })
        .collect::<Vec<_>>();

    if m.mesh.normals.is_empty() {
        compute_normals(&mut vertices, &m.mesh.indices);
    }

    MeshData {
        name: m.name.clone(),
        vertices,
        indices: m.mesh.indices.clone(),
        material: m.mesh.material_id.unwrap_or(0),
    }
}

/// Smooth normals for files that ship none: face normals are accumulated per vertex
/// (area weighted, since the cross product is not normalised) and then normalised.
pub fn compute_normals(vertices: &mut [model::ModelVertex], indices: &[u32]) {
    use cgmath::{InnerSpace, Vector3};

    let mut sums = vec![Vector3::new(0.0f32, 0.0, 0.0); vertices.len()];
    for c in indices.chunks(3) {
        if c.len() < 3 {
            break;
        }
        let [i0, i1, i2] = [c[0] as usize, c[1] as usize, c[2] as usize];
        let pos0: Vector3<_> = vertices[i0].position.into();
        let pos1: Vector3<_> = vertices[i1].position.into();
        let pos2: Vector3<_> = vertices[i2].position.into();
        let face = (pos1 - pos0).cross(pos2 - pos0);
        sums[i0] += face;
        sums[i1] += face;
        sums[i2] += face;
    }
    for (v, sum) in vertices.iter_mut().zip(sums) {
        if sum.magnitude2() > 0.0 {
            v.normal = sum.normalize().into();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MTL: &str = "newmtl bark\nKd 0.4 0.2 0.1\n\nnewmtl leaves\nKd 0.1 0.6 0.2\nKe 0.0 0.1 0.0\nmap_Kd leaves.png\n";
    const OBJ: &str = "mtllib tree.mtl\no trunk\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl bark\nf 1 2 3\no crown\nv 0 1 0\nv 1 1 0\nv 0 2 0\nusemtl leaves\nf 4 5 6\n";

    #[test]
    fn materials_keep_file_order_and_maps() {
        let lib = MaterialLibrary::parse(MTL).unwrap();
        let defs = lib.definitions();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].material.name, "bark");
        assert_eq!(defs[0].material.color, [0.4, 0.2, 0.1]);
        assert_eq!(defs[1].material.emissive, [0.0, 0.1, 0.0]);
        assert_eq!(defs[1].diffuse_texture.as_deref(), Some("leaves.png"));
    }

    #[test]
    fn street_lamp_bulb_glows() {
        let lib = MaterialLibrary::parse(include_str!("../../assets/models/street_lamp.mtl")).unwrap();
        let defs = lib.definitions();
        let bulb = defs.iter().find(|d| d.material.name == "bulb").unwrap();
        assert_eq!(bulb.material.emissive, [1.0, 0.9, 0.6]);
        let metal = defs.iter().find(|d| d.material.name == "metal").unwrap();
        assert_eq!(metal.material.emissive, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn usemtl_resolves_against_preloaded_library() {
        let lib = MaterialLibrary::parse(MTL).unwrap();
        let meshes = parse_obj(OBJ, &lib).unwrap();
        assert_eq!(meshes.len(), 2);
        assert_eq!(meshes[0].material, 0);
        assert_eq!(meshes[1].material, 1);
    }

    #[test]
    fn missing_normals_are_generated() {
        let lib = MaterialLibrary::default();
        let meshes = parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n", &lib).unwrap();
        for v in &meshes[0].vertices {
            assert_eq!(v.normal, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn faceless_geometry_is_an_error() {
        assert!(parse_obj("v 0 0 0\n", &MaterialLibrary::default()).is_err());
    }
}
