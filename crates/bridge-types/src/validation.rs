//! Configuration validation for pluggable implementations.
//!
//! Every backend (storage, custody ledger) receives its own raw TOML table.
//! Backends describe the table they expect as a [`Schema`] and expose it
//! through [`ConfigSchema`], so configuration mistakes surface when the
//! service starts instead of on first use.

use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
	/// A required field is absent.
	#[error("Missing required field: {0}")]
	MissingField(String),
	/// A field is present but its value is rejected.
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	/// A field has the wrong TOML type.
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: &'static str,
		actual: String,
	},
}

impl ValidationError {
	/// Qualifies the offending field with the path of its parent table.
	fn nested_in(self, parent: &str) -> Self {
		match self {
			ValidationError::MissingField(f) => {
				ValidationError::MissingField(format!("{}.{}", parent, f))
			},
			ValidationError::InvalidValue { field, message } => ValidationError::InvalidValue {
				field: format!("{}.{}", parent, field),
				message,
			},
			ValidationError::TypeMismatch {
				field,
				expected,
				actual,
			} => ValidationError::TypeMismatch {
				field: format!("{}.{}", parent, field),
				expected,
				actual,
			},
		}
	}
}

/// Expected TOML type of a field.
#[derive(Debug)]
pub enum FieldType {
	String,
	/// Integer with optional inclusive bounds.
	Integer { min: Option<i64>, max: Option<i64> },
	Boolean,
	/// Homogeneous array.
	Array(Box<FieldType>),
	/// Nested table validated against its own schema.
	Table(Schema),
}

/// Custom check run after the type check succeeded.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// A named field of a schema.
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub required: bool,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("required", &self.required)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	/// A field that must be present.
	pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			required: true,
			validator: None,
		}
	}

	/// A field that is checked only when present.
	pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			required: false,
			..Self::required(name, field_type)
		}
	}

	/// Attaches a custom validator, returning an error message on failure.
	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		check_type(&self.name, value, &self.field_type)?;
		if let Some(validator) = &self.validator {
			validator(value).map_err(|message| ValidationError::InvalidValue {
				field: self.name.clone(),
				message,
			})?;
		}
		Ok(())
	}
}

/// Schema of a TOML table.
#[derive(Debug, Default)]
pub struct Schema {
	pub fields: Vec<Field>,
}

impl Schema {
	pub fn new(fields: Vec<Field>) -> Self {
		Self { fields }
	}

	/// Validates `config`, which must be a table.
	///
	/// Unknown keys are ignored so implementations can share one table layout.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| ValidationError::TypeMismatch {
				field: "root".to_string(),
				expected: "table",
				actual: config.type_str().to_string(),
			})?;

		for field in &self.fields {
			match table.get(&field.name) {
				Some(value) => field.check(value)?,
				None if field.required => {
					return Err(ValidationError::MissingField(field.name.clone()))
				},
				None => {},
			}
		}

		Ok(())
	}
}

fn mismatch(field: &str, expected: &'static str, value: &toml::Value) -> ValidationError {
	ValidationError::TypeMismatch {
		field: field.to_string(),
		expected,
		actual: value.type_str().to_string(),
	}
}

fn check_type(
	field: &str,
	value: &toml::Value,
	expected: &FieldType,
) -> Result<(), ValidationError> {
	match expected {
		FieldType::String if !value.is_str() => Err(mismatch(field, "string", value)),
		FieldType::Boolean if !value.is_bool() => Err(mismatch(field, "boolean", value)),
		FieldType::String | FieldType::Boolean => Ok(()),
		FieldType::Integer { min, max } => {
			let int = value
				.as_integer()
				.ok_or_else(|| mismatch(field, "integer", value))?;
			if min.is_some_and(|min| int < min) || max.is_some_and(|max| int > max) {
				return Err(ValidationError::InvalidValue {
					field: field.to_string(),
					message: format!("{} is outside [{:?}, {:?}]", int, min, max),
				});
			}
			Ok(())
		},
		FieldType::Array(inner) => {
			let items = value
				.as_array()
				.ok_or_else(|| mismatch(field, "array", value))?;
			for (i, item) in items.iter().enumerate() {
				check_type(&format!("{}[{}]", field, i), item, inner)?;
			}
			Ok(())
		},
		FieldType::Table(schema) => schema.validate(value).map_err(|e| e.nested_in(field)),
	}
}

/// Implemented by every pluggable backend to validate its configuration table.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}
