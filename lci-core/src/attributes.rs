use std::collections::HashMap;

use crate::error::{LciCoreError, Result};

/// Immutable 3-axis tensor of named vehicle parameters, indexed by
/// (parameter, sample, config).
///
/// The config axis enumerates the run's vehicle configurations (powertrain,
/// size class, year combinations) in the order declared by the scope that
/// produced the array. Each parameter holds one scalar per (sample, config):
/// masses in kg, distances in km, energies in kWh, rates as fractions.
#[derive(Debug, Clone)]
pub struct VehicleAttributeArray {
    parameters: Vec<String>,
    index: HashMap<String, usize>,
    samples: usize,
    configs: usize,
    data: Vec<f64>,
}

impl VehicleAttributeArray {
    /// Creates a zero-filled array for the given parameter names.
    pub fn new(parameters: Vec<String>, samples: usize, configs: usize) -> Result<Self> {
        let mut index = HashMap::with_capacity(parameters.len());
        for (i, name) in parameters.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(LciCoreError::DuplicateParameter(name.clone()));
            }
        }
        let data = vec![0.0; parameters.len() * samples * configs];
        Ok(Self {
            parameters,
            index,
            samples,
            configs,
            data,
        })
    }

    /// Creates an array from a flat value buffer laid out parameter-major,
    /// then sample, then config.
    pub fn from_values(
        parameters: Vec<String>,
        samples: usize,
        configs: usize,
        values: Vec<f64>,
    ) -> Result<Self> {
        let expected = parameters.len() * samples * configs;
        if values.len() != expected {
            return Err(LciCoreError::InvalidDimensions(format!(
                "Attribute buffer length ({}) must match parameters x samples x configs ({})",
                values.len(),
                expected
            )));
        }
        let mut array = Self::new(parameters, samples, configs)?;
        array.data = values;
        Ok(array)
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn configs(&self) -> usize {
        self.configs
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    fn parameter_index(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| LciCoreError::UnknownParameter(name.to_string()))
    }

    fn offset(&self, parameter: usize, sample: usize, config: usize) -> Result<usize> {
        if sample >= self.samples || config >= self.configs {
            return Err(LciCoreError::IndexOutOfBounds(format!(
                "(sample {}, config {}) outside array of {} samples x {} configs",
                sample, config, self.samples, self.configs
            )));
        }
        Ok((parameter * self.samples + sample) * self.configs + config)
    }

    /// Reads one parameter value. Unknown parameter names fail loudly.
    pub fn value(&self, name: &str, sample: usize, config: usize) -> Result<f64> {
        let parameter = self.parameter_index(name)?;
        let offset = self.offset(parameter, sample, config)?;
        Ok(self.data[offset])
    }

    /// Sets one parameter value; intended for the upstream producer.
    pub fn set(&mut self, name: &str, sample: usize, config: usize, value: f64) -> Result<()> {
        let parameter = self.parameter_index(name)?;
        let offset = self.offset(parameter, sample, config)?;
        self.data[offset] = value;
        Ok(())
    }

    /// Sets one parameter to `value` for every (sample, config).
    pub fn fill(&mut self, name: &str, value: f64) -> Result<()> {
        let parameter = self.parameter_index(name)?;
        let start = parameter * self.samples * self.configs;
        let end = start + self.samples * self.configs;
        self.data[start..end].fill(value);
        Ok(())
    }
}
