use ale_hydro::{
    gas_law::GasLaw, Engine, InitialConditions, LagrangianParams, PredictorCorrectorRunner,
    UnstructuredMesh, ViscosityParams,
};
use clap::Parser;
use glam::DVec2;
use std::{error::Error, fs, path};
use thiserror::Error;
use yaml_rust::{Yaml, YamlLoader};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required parameter in configuration: {0}")]
    MissingParameter(String),
    #[error("Unknown type of initial conditions configured: {0}")]
    UnknownICs(String),
    #[error("Illegal DVec2 format: {0}!")]
    IllegalDVec2(String),
    #[error("Expected array of numbers but found: {0:?}")]
    InvalidArrayFormat(Yaml),
    #[error("Expected array of length {0}, but found {1}")]
    InvalidArrayLength(usize, usize),
    #[error("Expected integers in initial_conditions:{0}, but found {1}")]
    InvalidIndex(String, f64),
}

/// Read a numeric array from the configuration, checking its length if one is given.
macro_rules! cfg_ics2vec {
    ($yaml:expr, $prop:expr) => {
        match $yaml[$prop].as_vec() {
            Some(arr) => arr
                .iter()
                .map(|y| as_f64(y).ok_or_else(|| ConfigError::InvalidArrayFormat($yaml[$prop].clone())))
                .collect::<Result<Vec<_>, _>>(),
            None => Err(ConfigError::MissingParameter(format!(
                "initial_conditions:{}",
                $prop
            ))),
        }
    };
    ($yaml:expr, $prop:expr, $count:expr) => {
        cfg_ics2vec!($yaml, $prop).and_then(|arr| {
            if arr.len() == $count {
                Ok(arr)
            } else {
                Err(ConfigError::InvalidArrayLength($count, arr.len()))
            }
        })
    };
}

/// Like `Yaml::as_f64`, but also accepts integers.
fn as_f64(yaml: &Yaml) -> Option<f64> {
    match yaml {
        Yaml::Real(s) => s.parse().ok(),
        Yaml::Integer(i) => Some(*i as f64),
        _ => None,
    }
}

fn as_integers(values: Vec<f64>, prop: &str) -> Result<Vec<i64>, ConfigError> {
    values
        .into_iter()
        .map(|v| {
            if v.fract() == 0. && v.abs() <= i64::MAX as f64 {
                Ok(v as i64)
            } else {
                Err(ConfigError::InvalidIndex(prop.to_string(), v))
            }
        })
        .collect()
}

/// Read non-negative integers, rejecting anything a cast would silently saturate or truncate.
fn as_indices(values: Vec<f64>, prop: &str) -> Result<Vec<usize>, ConfigError> {
    values
        .into_iter()
        .map(|v| {
            if v >= 0. && v.fract() == 0. && v <= usize::MAX as f64 {
                Ok(v as usize)
            } else {
                Err(ConfigError::InvalidIndex(prop.to_string(), v))
            }
        })
        .collect()
}

fn parse_dvec2(yaml: &Yaml) -> Result<DVec2, ()> {
    let yaml_vec = yaml.as_vec().ok_or(())?;
    match &yaml_vec[..] {
        [a, b] => Ok(DVec2 {
            x: as_f64(a).ok_or(())?,
            y: as_f64(b).ok_or(())?,
        }),
        _ => Err(()),
    }
}

fn sod_shock(centroid: DVec2, box_size: DVec2) -> (f64, f64) {
    if centroid.x < 0.5 * box_size.x {
        (1., 2.5)
    } else {
        (0.125, 2.)
    }
}

fn blast(centroid: DVec2, box_size: DVec2) -> (f64, f64) {
    let radius = 0.1 * box_size.min_element();
    if centroid.distance(0.5 * box_size) < radius {
        (1., 10.)
    } else {
        (1., 0.1)
    }
}

fn noh(_centroid: DVec2, _box_size: DVec2) -> (f64, f64) {
    (1., 1e-6)
}

fn constant(_centroid: DVec2, _box_size: DVec2) -> (f64, f64) {
    (1., 2.5)
}

fn ics_from_preset(
    name: String,
    cells: [usize; 2],
    box_size: DVec2,
    halo_layer: bool,
    perturbations: Option<f64>,
) -> Result<InitialConditions, Box<dyn Error>> {
    let profile = match name.as_str() {
        "sodshock" => sod_shock,
        "blast" => blast,
        "noh" => noh,
        "constant" => constant,
        _ => return Err(Box::new(ConfigError::UnknownICs(name))),
    };
    let ics = InitialConditions::from_fn(cells, box_size, halo_layer, perturbations, |x| {
        profile(x, box_size)
    })?;

    Ok(match name.as_str() {
        // converging flow towards the centre of the box
        "noh" => ics.set_velocities_fn(|x| (0.5 * box_size - x).normalize_or_zero()),
        _ => ics,
    })
}

enum InitialConditionsCfg {
    Config {
        nodes: Vec<DVec2>,
        cells_offsets: Vec<usize>,
        cells_to_nodes: Vec<usize>,
        halo_index: Vec<i64>,
        halo_neighbour: Vec<usize>,
        halo_normal: Vec<DVec2>,
        halo_cell: Vec<usize>,
        density: Vec<f64>,
        energy: Vec<f64>,
    },
    Preset {
        name: String,
        cells: [usize; 2],
        box_size: DVec2,
        halo_layer: bool,
        perturbations: Option<f64>,
    },
}

impl InitialConditionsCfg {
    fn parse(yaml: &Yaml) -> Result<Self, ConfigError> {
        let kind = yaml["kind"].as_str().ok_or(ConfigError::MissingParameter(
            "initial_conditions:kind".to_string(),
        ))?;

        Ok(match kind {
            "config" => {
                let nodes_x = cfg_ics2vec!(yaml, "nodes_x")?;
                let nodes_y = cfg_ics2vec!(yaml, "nodes_y", nodes_x.len())?;
                let nodes = nodes_x
                    .into_iter()
                    .zip(nodes_y)
                    .map(|(x, y)| DVec2::new(x, y))
                    .collect::<Vec<_>>();
                let cells_offsets =
                    as_indices(cfg_ics2vec!(yaml, "cells_offsets")?, "cells_offsets")?;
                let ncells = cells_offsets.len().saturating_sub(1);
                let cells_to_nodes =
                    as_indices(cfg_ics2vec!(yaml, "cells_to_nodes")?, "cells_to_nodes")?;
                let halo_index =
                    as_integers(cfg_ics2vec!(yaml, "halo_index", nodes.len())?, "halo_index")?;
                let (halo_neighbour, halo_normal) = if yaml["halo_neighbour"].is_badvalue() {
                    (vec![], vec![])
                } else {
                    let neighbour =
                        as_indices(cfg_ics2vec!(yaml, "halo_neighbour")?, "halo_neighbour")?;
                    let normal_x = cfg_ics2vec!(yaml, "halo_normal_x", neighbour.len())?;
                    let normal_y = cfg_ics2vec!(yaml, "halo_normal_y", neighbour.len())?;
                    let normal = normal_x
                        .into_iter()
                        .zip(normal_y)
                        .map(|(x, y)| DVec2::new(x, y))
                        .collect();
                    (neighbour, normal)
                };
                let halo_cell =
                    as_indices(cfg_ics2vec!(yaml, "halo_cell", ncells)?, "halo_cell")?;
                let density = cfg_ics2vec!(yaml, "density", ncells)?;
                let energy = cfg_ics2vec!(yaml, "energy", ncells)?;
                Self::Config {
                    nodes,
                    cells_offsets,
                    cells_to_nodes,
                    halo_index,
                    halo_neighbour,
                    halo_normal,
                    halo_cell,
                    density,
                    energy,
                }
            }
            _ => {
                let cells = match yaml["cells"].as_vec().map(|v| &v[..]) {
                    Some([Yaml::Integer(nx), Yaml::Integer(ny)]) if *nx > 0 && *ny > 0 => {
                        [*nx as usize, *ny as usize]
                    }
                    Some(_) => {
                        return Err(ConfigError::InvalidArrayFormat(yaml["cells"].clone()))
                    }
                    None => [10, 10],
                };
                let box_size = if yaml["box_size"].is_badvalue() {
                    DVec2::ONE
                } else {
                    parse_dvec2(&yaml["box_size"])
                        .map_err(|_| ConfigError::IllegalDVec2(format!("{:?}", yaml["box_size"])))?
                };
                Self::Preset {
                    name: kind.to_string(),
                    cells,
                    box_size,
                    halo_layer: yaml["halo_layer"].as_bool().unwrap_or(false),
                    perturbations: as_f64(&yaml["perturbations"]),
                }
            }
        })
    }
}

struct HydroCfg {
    gas_law: GasLaw,
    cfl: f64,
    viscosity: ViscosityParams,
}

impl HydroCfg {
    fn parse(yaml: &Yaml) -> Result<Self, ConfigError> {
        let gamma = as_f64(&yaml["gamma"]).ok_or(ConfigError::MissingParameter(
            "hydrodynamics:gamma".to_string(),
        ))?;
        let cfl = as_f64(&yaml["cfl_criterion"]).ok_or(ConfigError::MissingParameter(
            "hydrodynamics:cfl_criterion".to_string(),
        ))?;
        let default = ViscosityParams::default();
        let viscosity = ViscosityParams {
            linear: as_f64(&yaml["viscosity"]["linear"]).unwrap_or(default.linear),
            quadratic: as_f64(&yaml["viscosity"]["quadratic"]).unwrap_or(default.quadratic),
        };
        Ok(Self {
            gas_law: GasLaw::new(gamma),
            cfl,
            viscosity,
        })
    }
}

struct EngineCfg {
    t_end: f64,
    dt_min: f64,
    dt_max: f64,
    max_retries: usize,
    dt_status: f64,
}

impl EngineCfg {
    fn parse(yaml_engine: &Yaml, yaml_time_integration: &Yaml) -> Result<Self, ConfigError> {
        let dt_status = as_f64(&yaml_engine["dt_status"]).ok_or(
            ConfigError::MissingParameter("engine:dt_status".to_string()),
        )?;
        let t_end = as_f64(&yaml_time_integration["t_end"]).ok_or(
            ConfigError::MissingParameter("time_integration:t_end".to_string()),
        )?;
        let dt_min = as_f64(&yaml_time_integration["dt_min"]).ok_or(
            ConfigError::MissingParameter("time_integration:dt_min".to_string()),
        )?;
        let dt_max = as_f64(&yaml_time_integration["dt_max"]).ok_or(
            ConfigError::MissingParameter("time_integration:dt_max".to_string()),
        )?;
        let max_retries = yaml_time_integration["max_retries"].as_i64().unwrap_or(3) as usize;

        Ok(Self {
            t_end,
            dt_min,
            dt_max,
            max_retries,
            dt_status,
        })
    }
}

struct Config {
    hydro: HydroCfg,
    engine: EngineCfg,
    initial_conditions: InitialConditionsCfg,
}

impl Config {
    fn parse(file: path::PathBuf) -> Result<Self, Box<dyn Error>> {
        let docs = YamlLoader::load_from_str(&fs::read_to_string(file)?)?;
        let config_yml = docs
            .first()
            .ok_or(ConfigError::MissingParameter("hydrodynamics".to_string()))?;

        Ok(Self {
            hydro: HydroCfg::parse(&config_yml["hydrodynamics"])?,
            engine: EngineCfg::parse(&config_yml["engine"], &config_yml["time_integration"])?,
            initial_conditions: InitialConditionsCfg::parse(&config_yml["initial_conditions"])?,
        })
    }
}

#[derive(Parser)]
pub struct Cli {
    /// The path to the config file to read
    #[clap(parse(from_os_str))]
    pub config: path::PathBuf,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    // parse command line parameters
    let args = Cli::parse();

    // read configuration
    let config = Config::parse(args.config)?;

    // Setup ICs
    let ics = match config.initial_conditions {
        InitialConditionsCfg::Config {
            nodes,
            cells_offsets,
            cells_to_nodes,
            halo_index,
            halo_neighbour,
            halo_normal,
            halo_cell,
            density,
            energy,
        } => {
            let mesh = UnstructuredMesh::from_raw(
                nodes.len(),
                cells_offsets,
                cells_to_nodes,
                &halo_index,
                &halo_neighbour,
                &halo_normal,
                &halo_cell,
            )?;
            InitialConditions::new(mesh, nodes, density, energy)
        }
        InitialConditionsCfg::Preset {
            name,
            cells,
            box_size,
            halo_layer,
            perturbations,
        } => ics_from_preset(name, cells, box_size, halo_layer, perturbations)?,
    };
    let (mesh, mut state) = ics.into_parts()?;

    // Setup simulation
    let params = LagrangianParams {
        gas_law: config.hydro.gas_law,
        viscosity: config.hydro.viscosity,
        cfl: config.hydro.cfl,
    };
    let runner = PredictorCorrectorRunner::new(&mesh, params);
    let mut engine = Engine::new(
        Box::new(runner),
        config.engine.t_end,
        config.engine.dt_min,
        config.engine.dt_max,
        config.engine.max_retries,
        config.engine.dt_status,
    );

    // run
    engine.run(&mesh, &mut state)?;

    log::info!(
        "Final total mass: {:.12e}, total internal energy: {:.12e}",
        state.total_mass(&mesh),
        state.total_internal_energy(&mesh)
    );
    println!("Done!");
    Ok(())
}
