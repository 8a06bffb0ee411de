//! SQL statement templates with `{{placeholder}}` substitution.
//!
//! Templates are parsed once when a role is built so unknown placeholders and unterminated
//! braces surface as configuration errors instead of failing mid-issuance.

// crates.io
use time::{UtcOffset, format_description::BorrowedFormatItem, macros::format_description};
// self
use crate::{
	_prelude::*,
	auth::{CredentialSecret, RoleName, TenantId},
};

const EXPIRATION_FORMAT: &[BorrowedFormatItem<'static>] =
	format_description!("[year]-[month]-[day] [hour]:[minute]:[second]+00");

/// Errors raised while parsing or rendering a [`StatementTemplate`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum TemplateError {
	/// A `{{` was never closed.
	#[error("Template has an unterminated placeholder starting at byte {offset}.")]
	Unterminated {
		/// Byte offset of the opening braces.
		offset: usize,
	},
	/// The template names a placeholder the broker does not know.
	#[error("Template references the unknown placeholder `{name}`.")]
	UnknownPlaceholder {
		/// Placeholder name as written.
		name: String,
	},
	/// Rendering required a value the caller did not supply.
	#[error("Template requires `{placeholder}` but no value was supplied.")]
	MissingValue {
		/// Placeholder that could not be filled.
		placeholder: Placeholder,
	},
	/// The expiration instant could not be formatted.
	#[error("Expiration could not be formatted: {message}.")]
	Format {
		/// Formatter failure message.
		message: String,
	},
}

/// Values a template may reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Placeholder {
	/// Generated database username.
	Name,
	/// Generated password (creation statements only).
	Password,
	/// Lease expiry in UTC.
	Expiration,
	/// Tenant identifier.
	Tenant,
	/// Role name.
	Role,
	/// Target database name.
	Database,
}
impl Placeholder {
	/// Returns the placeholder spelling used inside `{{ }}`.
	pub const fn as_str(self) -> &'static str {
		match self {
			Placeholder::Name => "name",
			Placeholder::Password => "password",
			Placeholder::Expiration => "expiration",
			Placeholder::Tenant => "tenant",
			Placeholder::Role => "role",
			Placeholder::Database => "database",
		}
	}

	fn parse(name: &str) -> Option<Self> {
		Some(match name {
			"name" => Placeholder::Name,
			"password" => Placeholder::Password,
			"expiration" => Placeholder::Expiration,
			"tenant" => Placeholder::Tenant,
			"role" => Placeholder::Role,
			"database" => Placeholder::Database,
			_ => return None,
		})
	}
}
impl Display for Placeholder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
	Literal(String),
	Value(Placeholder),
}

/// Values substituted into a template.
#[derive(Clone, Copy, Debug)]
pub struct StatementContext<'a> {
	/// Generated database username.
	pub name: &'a str,
	/// Generated password; absent outside issuance.
	pub password: Option<&'a CredentialSecret>,
	/// Lease expiry.
	pub expiration: OffsetDateTime,
	/// Tenant identifier.
	pub tenant: &'a TenantId,
	/// Role name.
	pub role: &'a RoleName,
	/// Target database name.
	pub database: &'a str,
}

/// Parsed SQL template.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StatementTemplate {
	source: String,
	segments: Vec<Segment>,
}
impl StatementTemplate {
	/// Parses a template string.
	pub fn parse(source: impl Into<String>) -> Result<Self, TemplateError> {
		let source = source.into();
		let mut segments = Vec::new();
		let mut rest = source.as_str();
		let mut offset = 0;

		while let Some(open) = rest.find("{{") {
			if open > 0 {
				segments.push(Segment::Literal(rest[..open].to_owned()));
			}

			let after_open = &rest[open + 2..];
			let close =
				after_open.find("}}").ok_or(TemplateError::Unterminated { offset: offset + open })?;
			let name = after_open[..close].trim();
			let placeholder = Placeholder::parse(name)
				.ok_or_else(|| TemplateError::UnknownPlaceholder { name: name.to_owned() })?;

			segments.push(Segment::Value(placeholder));

			let consumed = open + 2 + close + 2;

			offset += consumed;
			rest = &rest[consumed..];
		}

		if !rest.is_empty() {
			segments.push(Segment::Literal(rest.to_owned()));
		}

		Ok(Self { source, segments })
	}

	/// Returns `true` if the template references the placeholder.
	pub fn references(&self, placeholder: Placeholder) -> bool {
		self.segments.iter().any(|segment| matches!(segment, Segment::Value(p) if *p == placeholder))
	}

	/// The template as written.
	pub fn as_str(&self) -> &str {
		&self.source
	}

	/// Substitutes every placeholder.
	pub fn render(&self, ctx: &StatementContext<'_>) -> Result<String, TemplateError> {
		let mut out = String::with_capacity(self.source.len() + 32);

		for segment in &self.segments {
			match segment {
				Segment::Literal(text) => out.push_str(text),
				Segment::Value(Placeholder::Name) => out.push_str(ctx.name),
				Segment::Value(Placeholder::Password) => {
					let secret = ctx
						.password
						.ok_or(TemplateError::MissingValue { placeholder: Placeholder::Password })?;

					out.push_str(secret.expose());
				},
				Segment::Value(Placeholder::Expiration) =>
					out.push_str(&format_expiration(ctx.expiration)?),
				Segment::Value(Placeholder::Tenant) => out.push_str(ctx.tenant),
				Segment::Value(Placeholder::Role) => out.push_str(ctx.role),
				Segment::Value(Placeholder::Database) => out.push_str(ctx.database),
			}
		}

		Ok(out)
	}
}
impl Debug for StatementTemplate {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("StatementTemplate").field(&self.source).finish()
	}
}
impl Display for StatementTemplate {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.source)
	}
}
impl FromStr for StatementTemplate {
	type Err = TemplateError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}
impl TryFrom<String> for StatementTemplate {
	type Error = TemplateError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::parse(value)
	}
}
impl From<StatementTemplate> for String {
	fn from(value: StatementTemplate) -> Self {
		value.source
	}
}

/// Renders a list of templates with the same context.
pub(crate) fn render_all(
	templates: &[StatementTemplate],
	ctx: &StatementContext<'_>,
) -> Result<Vec<String>, TemplateError> {
	templates.iter().map(|template| template.render(ctx)).collect()
}

fn format_expiration(instant: OffsetDateTime) -> Result<String, TemplateError> {
	instant
		.to_offset(UtcOffset::UTC)
		.format(EXPIRATION_FORMAT)
		.map_err(|e| TemplateError::Format { message: e.to_string() })
}
