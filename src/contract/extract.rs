//! SpecExtractor: OpenAPI document → ContractModel
//!
//! Accepts OpenAPI 3.0 and 3.1 documents in JSON or YAML. Only the structure
//! needed for gap analysis is read; unknown and `x-` fields are ignored apart
//! from the admin markers.

use super::{
    normalize_path, path_params, BodyShape, Bounds, ContractModel, EndpointId, EndpointSpec,
    HttpMethod, ParamLocation, ParamType, Parameter, ResponseSpec,
};
use crate::error::{Error, Result};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

const DEFAULT_MAX_REF_DEPTH: usize = 16;

/// Parses contract documents into a [`ContractModel`]
#[derive(Debug, Clone)]
pub struct SpecExtractor {
    max_ref_depth: usize,
}

impl Default for SpecExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl SpecExtractor {
    pub fn new() -> Self {
        Self {
            max_ref_depth: DEFAULT_MAX_REF_DEPTH,
        }
    }

    /// Bound on chained `$ref` hops before the document is rejected
    pub fn with_max_ref_depth(mut self, depth: usize) -> Self {
        self.max_ref_depth = depth.max(1);
        self
    }

    /// Parse a contract document
    pub fn extract(&self, text: &str) -> Result<ContractModel> {
        let doc = parse_document(text)?;
        let root = doc
            .as_object()
            .ok_or_else(|| Error::ContractParse("document root is not an object".into()))?;
        let paths = root
            .get("paths")
            .and_then(Value::as_object)
            .ok_or_else(|| Error::ContractParse("missing or non-object 'paths'".into()))?;

        let walker = Walker {
            doc: &doc,
            max_depth: self.max_ref_depth,
        };
        let global_security = root.get("security");

        let mut endpoints = BTreeMap::new();
        for (raw_path, item) in paths {
            let item = walker.resolve(item)?.as_object().ok_or_else(|| {
                Error::ContractParse(format!("path item '{}' is not an object", raw_path))
            })?;
            let path = normalize_path(raw_path);

            for (key, operation) in item {
                let Ok(method) = key.parse::<HttpMethod>() else {
                    continue;
                };
                let id = EndpointId {
                    path: path.clone(),
                    method,
                };
                let operation = operation.as_object().ok_or_else(|| {
                    Error::ContractParse(format!("operation {} is not an object", id))
                })?;

                let endpoint = walker.endpoint(
                    id.clone(),
                    item.get("parameters"),
                    operation,
                    global_security,
                )?;

                if endpoints.insert(id.clone(), endpoint).is_some() {
                    return Err(Error::ContractParse(format!(
                        "duplicate operation {} (paths normalize to the same template)",
                        id
                    )));
                }
            }
        }

        let info = root.get("info").and_then(Value::as_object);
        let info_str = |key: &str| {
            info.and_then(|i| i.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        Ok(ContractModel {
            title: info_str("title"),
            version: info_str("version"),
            fingerprint: fingerprint(text),
            endpoints,
        })
    }
}

/// Short content hash of a contract document
pub(crate) fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("sha256:{}", hex::encode(&hasher.finalize()[..8]))
}

fn parse_document(text: &str) -> Result<Value> {
    if text.trim_start().starts_with('{') {
        return serde_json::from_str(text)
            .map_err(|e| Error::ContractParse(format!("invalid JSON: {}", e)));
    }
    let yaml: serde_norway::Value = serde_norway::from_str(text)
        .map_err(|e| Error::ContractParse(format!("invalid YAML: {}", e)))?;
    Ok(yaml_to_json(yaml))
}

/// YAML allows non-string keys (`200:`); JSON maps need strings
fn yaml_to_json(value: serde_norway::Value) -> Value {
    use serde_norway::Value as Y;
    match value {
        Y::Null => Value::Null,
        Y::Bool(b) => Value::Bool(b),
        Y::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64().map(Value::from).unwrap_or(Value::Null)
            }
        }
        Y::String(s) => Value::String(s),
        Y::Sequence(items) => Value::Array(items.into_iter().map(yaml_to_json).collect()),
        Y::Mapping(mapping) => {
            let mut map = Map::new();
            for (k, v) in mapping {
                let key = match k {
                    Y::String(s) => s,
                    Y::Number(n) => n.to_string(),
                    Y::Bool(b) => b.to_string(),
                    other => match yaml_to_json(other) {
                        Value::String(s) => s,
                        v => v.to_string(),
                    },
                };
                map.insert(key, yaml_to_json(v));
            }
            Value::Object(map)
        }
        Y::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

struct Walker<'d> {
    doc: &'d Value,
    max_depth: usize,
}

impl<'d> Walker<'d> {
    /// Follow local `$ref` chains
    fn resolve<'v>(&self, value: &'v Value) -> Result<&'v Value>
    where
        'd: 'v,
    {
        let mut current = value;
        for _ in 0..=self.max_depth {
            let Some(reference) = current.get("$ref").and_then(Value::as_str) else {
                return Ok(current);
            };
            let pointer = reference.strip_prefix('#').ok_or_else(|| {
                Error::ContractParse(format!("external $ref not supported: {}", reference))
            })?;
            current = self
                .doc
                .pointer(pointer)
                .ok_or_else(|| Error::ContractParse(format!("unresolved $ref: {}", reference)))?;
        }
        Err(Error::ContractParse(format!(
            "$ref chain exceeds depth {} (cycle?)",
            self.max_depth
        )))
    }

    /// Resolve refs and unwrap nullable `anyOf`/`oneOf` and single `allOf`
    fn schema<'v>(&self, value: &'v Value) -> Result<&'v Value>
    where
        'd: 'v,
    {
        let mut current = self.resolve(value)?;
        for _ in 0..=self.max_depth {
            let branches = current
                .get("anyOf")
                .or_else(|| current.get("oneOf"))
                .and_then(Value::as_array);
            if let Some(branches) = branches {
                let mut picked = None;
                for branch in branches {
                    let branch = self.resolve(branch)?;
                    if branch.get("type").and_then(Value::as_str) != Some("null") {
                        picked = Some(branch);
                        break;
                    }
                }
                match picked {
                    Some(branch) => {
                        current = branch;
                        continue;
                    }
                    None => return Ok(current),
                }
            }
            if let Some([single]) = current.get("allOf").and_then(Value::as_array).map(Vec::as_slice) {
                current = self.resolve(single)?;
                continue;
            }
            return Ok(current);
        }
        Ok(current)
    }

    fn endpoint(
        &self,
        id: EndpointId,
        path_level_params: Option<&Value>,
        op: &Map<String, Value>,
        global_security: Option<&Value>,
    ) -> Result<EndpointSpec> {
        let responses = op
            .get("responses")
            .and_then(Value::as_object)
            .ok_or_else(|| Error::ContractParse(format!("operation {} has no responses map", id)))?;

        let mut parameters = self.merge_parameters(&id, path_level_params, op.get("parameters"))?;

        if let Some(body) = op.get("requestBody") {
            for param in self.body_parameters(body)? {
                if !parameters
                    .iter()
                    .any(|p| p.name == param.name && p.location == param.location)
                {
                    parameters.push(param);
                }
            }
        }

        for name in path_params(&id.path) {
            if !parameters
                .iter()
                .any(|p| p.name == name && p.location == ParamLocation::Path)
            {
                parameters.push(Parameter::simple(name, ParamLocation::Path, ParamType::String));
            }
        }

        let mut declared = Vec::new();
        for (code, response) in responses {
            let Ok(status) = code.parse::<u16>() else {
                continue;
            };
            if !(100..=599).contains(&status) {
                continue;
            }
            let response = self.resolve(response)?;
            declared.push(ResponseSpec {
                status,
                shape: self.response_shape(response)?,
            });
        }
        declared.sort_by_key(|r| r.status);

        let tags: BTreeSet<String> = op
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let security = op.get("security").or(global_security);
        let auth_required = security.is_some_and(requires_auth);
        let admin_only = is_admin_only(op, security, &tags);

        Ok(EndpointSpec {
            id,
            summary: op
                .get("summary")
                .or_else(|| op.get("description"))
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string()),
            operation_id: op
                .get("operationId")
                .and_then(Value::as_str)
                .map(str::to_string),
            parameters,
            responses: declared,
            auth_required,
            admin_only,
            tags,
        })
    }

    /// Operation-level parameters override path-level ones on `(name, in)`
    fn merge_parameters(
        &self,
        id: &EndpointId,
        path_level: Option<&Value>,
        op_level: Option<&Value>,
    ) -> Result<Vec<Parameter>> {
        let mut merged: Vec<Parameter> = Vec::new();
        for list in [path_level, op_level].into_iter().flatten() {
            let list = self.resolve(list)?.as_array().ok_or_else(|| {
                Error::ContractParse(format!("{}: 'parameters' is not a list", id))
            })?;
            for param in list
                .iter()
                .map(|raw| self.parameter(id, raw))
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .flatten()
            {
                match merged
                    .iter_mut()
                    .find(|p| p.name == param.name && p.location == param.location)
                {
                    Some(existing) => *existing = param,
                    None => merged.push(param),
                }
            }
        }
        Ok(merged)
    }

    /// One declared parameter; a Swagger 2 `in: body` parameter expands to
    /// its schema's properties
    fn parameter(&self, id: &EndpointId, raw: &Value) -> Result<Vec<Parameter>> {
        let raw = self.resolve(raw)?;
        let name = raw
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::ContractParse(format!("{}: parameter without a name", id)))?;
        let location = match raw.get("in").and_then(Value::as_str) {
            Some("path") => ParamLocation::Path,
            Some("query") => ParamLocation::Query,
            Some("header") => ParamLocation::Header,
            Some("formData") => ParamLocation::Body,
            Some("body") => {
                let required = raw.get("required").and_then(Value::as_bool).unwrap_or(false);
                return match raw.get("schema") {
                    Some(schema) => self.schema_parameters(self.schema(schema)?, required),
                    None => Ok(Vec::new()),
                };
            }
            Some("cookie") => return Ok(Vec::new()),
            other => {
                return Err(Error::ContractParse(format!(
                    "{}: parameter '{}' has unsupported location {:?}",
                    id, name, other
                )))
            }
        };

        let schema = match raw.get("schema") {
            Some(schema) => Some(self.schema(schema)?),
            None => match raw.get("content").and_then(Value::as_object) {
                Some(content) => content
                    .values()
                    .find_map(|media| media.get("schema"))
                    .map(|s| self.schema(s))
                    .transpose()?,
                // Swagger 2 keeps type and bounds on the parameter itself
                None => raw.get("type").is_some().then_some(raw),
            },
        };

        let mut param = Parameter::simple(name, location, ParamType::String);
        param.required = location == ParamLocation::Path
            || raw.get("required").and_then(Value::as_bool).unwrap_or(false);
        if let Some(schema) = schema {
            self.apply_schema(&mut param, schema)?;
        }
        Ok(vec![param])
    }

    /// JSON body object properties become body parameters
    fn body_parameters(&self, body: &Value) -> Result<Vec<Parameter>> {
        let body = self.resolve(body)?;
        let body_required = body.get("required").and_then(Value::as_bool).unwrap_or(false);
        let Some(schema) = json_media_schema(body) else {
            return Ok(Vec::new());
        };
        self.schema_parameters(self.schema(schema)?, body_required)
    }

    /// Object properties of a request body schema, or one `body` parameter
    fn schema_parameters(&self, schema: &Value, body_required: bool) -> Result<Vec<Parameter>> {
        let (properties, required) = self.object_members(schema)?;
        if properties.is_empty() {
            let mut param = Parameter::simple("body", ParamLocation::Body, ParamType::Object);
            param.required = body_required;
            self.apply_schema(&mut param, schema)?;
            return Ok(vec![param]);
        }

        let mut params = Vec::with_capacity(properties.len());
        for (name, prop) in properties {
            let prop = self.schema(prop)?;
            if prop.get("readOnly").and_then(Value::as_bool) == Some(true) {
                continue;
            }
            let mut param = Parameter::simple(&name, ParamLocation::Body, ParamType::String);
            param.required = required.contains(&name);
            self.apply_schema(&mut param, prop)?;
            params.push(param);
        }
        Ok(params)
    }

    /// Properties and required names of an object schema, merging `allOf`
    fn object_members<'v>(
        &self,
        schema: &'v Value,
    ) -> Result<(Vec<(String, &'v Value)>, BTreeSet<String>)>
    where
        'd: 'v,
    {
        let mut properties: Vec<(String, &'v Value)> = Vec::new();
        let mut required = BTreeSet::new();

        let mut parts = vec![schema];
        if let Some(all) = schema.get("allOf").and_then(Value::as_array) {
            for part in all {
                parts.push(self.schema(part)?);
            }
        }

        for part in parts {
            if let Some(props) = part.get("properties").and_then(Value::as_object) {
                for (name, prop) in props {
                    if !properties.iter().any(|(n, _)| n == name) {
                        properties.push((name.clone(), prop));
                    }
                }
            }
            if let Some(req) = part.get("required").and_then(Value::as_array) {
                required.extend(req.iter().filter_map(Value::as_str).map(str::to_string));
            }
        }

        Ok((properties, required))
    }

    fn apply_schema(&self, param: &mut Parameter, schema: &Value) -> Result<()> {
        param.param_type = schema_type(schema).unwrap_or(param.param_type);
        param.format = schema
            .get("format")
            .and_then(Value::as_str)
            .map(str::to_string);
        param.default = schema.get("default").cloned();
        param.enum_values = schema
            .get("enum")
            .and_then(Value::as_array)
            .map(|values| values.iter().filter(|v| !v.is_null()).cloned().collect())
            .unwrap_or_default();
        param.bounds = bounds(schema, param.param_type == ParamType::Integer);

        if param.param_type == ParamType::Array {
            if let Some(items) = schema.get("items") {
                param.item_type = schema_type(self.schema(items)?);
            }
        }
        Ok(())
    }

    fn response_shape(&self, response: &Value) -> Result<Option<BodyShape>> {
        let Some(schema) = json_media_schema(response) else {
            return Ok(None);
        };
        let schema = self.schema(schema)?;
        let shape = match schema_type(schema) {
            Some(ParamType::Array) => BodyShape::Array,
            Some(ParamType::Object) => {
                let (properties, required) = self.object_members(schema)?;
                BodyShape::Object {
                    properties: properties.into_iter().map(|(name, _)| name).collect(),
                    required: required.into_iter().collect(),
                }
            }
            _ => BodyShape::Scalar,
        };
        Ok(Some(shape))
    }
}

fn json_media_schema(holder: &Value) -> Option<&Value> {
    let Some(content) = holder.get("content").and_then(Value::as_object) else {
        // Swagger 2 responses carry the schema directly
        return holder.get("schema");
    };
    content
        .get("application/json")
        .or_else(|| {
            content
                .iter()
                .find(|(media, _)| media.contains("json"))
                .map(|(_, v)| v)
        })
        .or_else(|| content.values().next())
        .and_then(|media| media.get("schema"))
}

fn schema_type(schema: &Value) -> Option<ParamType> {
    match schema.get("type") {
        Some(Value::String(t)) => ParamType::from_schema_type(t),
        // 3.1 type arrays: ["integer", "null"]
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .filter(|t| *t != "null")
            .find_map(ParamType::from_schema_type),
        _ => {
            if schema.get("properties").is_some() || schema.get("allOf").is_some() {
                Some(ParamType::Object)
            } else if schema.get("items").is_some() {
                Some(ParamType::Array)
            } else {
                None
            }
        }
    }
}

fn bounds(schema: &Value, integer: bool) -> Bounds {
    let num = |key: &str| schema.get(key).and_then(Value::as_f64);
    let count = |key: &str| schema.get(key).and_then(Value::as_u64);

    let mut b = Bounds {
        minimum: num("minimum"),
        maximum: num("maximum"),
        min_length: count("minLength"),
        max_length: count("maxLength"),
        min_items: count("minItems"),
        max_items: count("maxItems"),
        ..Bounds::default()
    };

    // 3.0: boolean modifiers on minimum/maximum; 3.1: numeric bounds
    match schema.get("exclusiveMinimum") {
        Some(Value::Bool(true)) => b.exclusive_minimum = b.minimum.is_some(),
        Some(v) if v.is_number() => {
            b.minimum = v.as_f64();
            b.exclusive_minimum = true;
        }
        _ => {}
    }
    match schema.get("exclusiveMaximum") {
        Some(Value::Bool(true)) => b.exclusive_maximum = b.maximum.is_some(),
        Some(v) if v.is_number() => {
            b.maximum = v.as_f64();
            b.exclusive_maximum = true;
        }
        _ => {}
    }

    if integer {
        if b.exclusive_minimum {
            b.minimum = b.minimum.map(|m| m.floor() + 1.0);
            b.exclusive_minimum = false;
        }
        if b.exclusive_maximum {
            b.maximum = b.maximum.map(|m| m.ceil() - 1.0);
            b.exclusive_maximum = false;
        }
    }
    b
}

fn requires_auth(security: &Value) -> bool {
    security.as_array().is_some_and(|reqs| {
        reqs.iter()
            .any(|req| req.as_object().is_some_and(|o| !o.is_empty()))
    })
}

fn is_admin_only(op: &Map<String, Value>, security: Option<&Value>, tags: &BTreeSet<String>) -> bool {
    let is_admin = |s: &str| s.to_ascii_lowercase().contains("admin");

    if op.get("x-admin-only").and_then(Value::as_bool) == Some(true) {
        return true;
    }
    let roles = op.get("x-roles").and_then(Value::as_array);
    if roles.is_some_and(|roles| roles.iter().filter_map(Value::as_str).any(|r| r.eq_ignore_ascii_case("admin"))) {
        return true;
    }
    let scopes = security
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
        .flat_map(|req| req.values())
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(Value::as_str);
    for scope in scopes {
        if is_admin(scope) {
            return true;
        }
    }
    tags.iter().any(|t| t.eq_ignore_ascii_case("admin"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PETSTORE: &str = r##"
openapi: 3.0.3
info: { title: Shop, version: "1.2" }
security:
  - bearerAuth: []
paths:
  /products:
    get:
      security: []
      tags: [Products]
      parameters:
        - name: page
          in: query
          required: true
          schema: { type: integer, minimum: 1, maximum: 100 }
        - name: session
          in: cookie
          schema: { type: string }
      responses:
        200:
          description: OK
          content:
            application/json:
              schema: { type: array, items: { $ref: "#/components/schemas/Product" } }
  /orders/:orderId:
    parameters:
      - $ref: "#/components/parameters/OrderId"
    delete:
      tags: [Orders]
      x-admin-only: true
      responses:
        "204": { description: Deleted }
        "404": { description: Missing }
        default: { description: Error }
  /users/register:
    post:
      security: []
      requestBody:
        required: true
        content:
          application/json:
            schema: { $ref: "#/components/schemas/NewUser" }
      responses:
        "201": { description: Created }
        "409": { description: Duplicate }
components:
  parameters:
    OrderId:
      name: orderId
      in: path
      schema: { type: integer, exclusiveMinimum: 0 }
  schemas:
    Product:
      type: object
      properties: { id: { type: integer } }
    NewUser:
      type: object
      required: [email, password]
      properties:
        id: { type: integer, readOnly: true }
        email: { type: string, format: email }
        password: { type: string, minLength: 8 }
        nickname:
          anyOf: [ { type: "null" }, { type: string, maxLength: 20 } ]
"##;

    fn model() -> ContractModel {
        SpecExtractor::new().extract(PETSTORE).unwrap()
    }

    #[test]
    fn test_extracts_query_parameter_bounds() {
        let model = model();
        let ep = model
            .get(&EndpointId::new("/products", HttpMethod::Get))
            .unwrap();
        assert_eq!(ep.parameters.len(), 1, "cookie parameters are ignored");
        let page = &ep.parameters[0];
        assert_eq!(page.param_type, ParamType::Integer);
        assert!(page.required);
        assert_eq!(page.bounds.minimum, Some(1.0));
        assert_eq!(page.bounds.maximum, Some(100.0));
        assert!(!ep.auth_required, "security: [] disables auth");
        assert_eq!(ep.responses[0].shape, Some(BodyShape::Array));
    }

    #[test]
    fn test_path_level_ref_parameter_and_admin_marker() {
        let model = model();
        let ep = model
            .get(&EndpointId::new("/orders/{orderId}", HttpMethod::Delete))
            .unwrap();
        assert!(ep.auth_required, "inherits document-level security");
        assert!(ep.admin_only);
        let order_id = ep.parameter("orderId").unwrap();
        assert_eq!(order_id.location, ParamLocation::Path);
        assert_eq!(order_id.bounds.minimum, Some(1.0));
        assert_eq!(ep.declared_statuses().into_iter().collect::<Vec<_>>(), vec![204, 404]);
    }

    #[test]
    fn test_body_properties_become_parameters() {
        let model = model();
        let ep = model
            .get(&EndpointId::new("/users/register", HttpMethod::Post))
            .unwrap();
        let names: Vec<_> = ep.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["email", "nickname", "password"]);
        assert!(ep.parameter("email").unwrap().required);
        assert!(!ep.parameter("nickname").unwrap().required);
        assert_eq!(ep.parameter("nickname").unwrap().bounds.max_length, Some(20));
        assert_eq!(ep.parameter("password").unwrap().bounds.min_length, Some(8));
        assert!(ep.declares(409));
    }

    #[test]
    fn test_metadata_and_fingerprint() {
        let model = model();
        assert_eq!(model.title.as_deref(), Some("Shop"));
        assert_eq!(model.version.as_deref(), Some("1.2"));
        assert!(model.fingerprint.starts_with("sha256:"));
        assert_eq!(model.fingerprint, fingerprint(PETSTORE));
    }

    #[test]
    fn test_json_document() {
        let json = r#"{"paths": {"/health": {"get": {"responses": {"200": {"description": "ok"}}}}}}"#;
        let model = SpecExtractor::new().extract(json).unwrap();
        assert_eq!(model.len(), 1);
    }

    #[test]
    fn test_missing_paths_is_parse_error() {
        let err = SpecExtractor::new().extract("openapi: 3.0.0\n").unwrap_err();
        assert!(matches!(err, Error::ContractParse(_)));
    }

    #[test]
    fn test_operation_without_responses_is_parse_error() {
        let doc = "paths:\n  /a:\n    get:\n      summary: x\n";
        let err = SpecExtractor::new().extract(doc).unwrap_err();
        assert!(err.to_string().contains("no responses map"));
    }

    #[test]
    fn test_duplicate_identity_after_normalization() {
        let doc = r#"
paths:
  /orders/{id}:
    get: { responses: { "200": { description: ok } } }
  /orders/:id/:
    get: { responses: { "200": { description: ok } } }
"#;
        let err = SpecExtractor::new().extract(doc).unwrap_err();
        assert!(err.to_string().contains("duplicate operation GET /orders/{id}"));
    }

    #[test]
    fn test_cyclic_ref_is_bounded() {
        let doc = r##"
paths:
  /a:
    get:
      parameters: [ { $ref: "#/components/parameters/A" } ]
      responses: { "200": { description: ok } }
components:
  parameters:
    A: { $ref: "#/components/parameters/B" }
    B: { $ref: "#/components/parameters/A" }
"##;
        let err = SpecExtractor::new().extract(doc).unwrap_err();
        assert!(err.to_string().contains("$ref chain"));
    }

    #[test]
    fn test_undeclared_path_parameter_is_added() {
        let doc = "paths:\n  /carts/{cartId}:\n    get:\n      responses: { '200': { description: ok } }\n";
        let model = SpecExtractor::new().extract(doc).unwrap();
        let ep = model.endpoints().next().unwrap();
        let param = ep.parameter("cartId").unwrap();
        assert!(param.required);
        assert_eq!(param.param_type, ParamType::String);
    }

    #[test]
    fn test_swagger_2_inline_and_body_parameters() {
        let doc = r##"
swagger: "2.0"
info: { title: Legacy, version: "0.9" }
paths:
  /pets:
    post:
      parameters:
        - name: limit
          in: query
          type: integer
          minimum: 1
          maximum: 50
        - name: pet
          in: body
          required: true
          schema: { $ref: "#/definitions/Pet" }
      responses:
        201:
          description: created
          schema: { $ref: "#/definitions/Pet" }
  /pets/{petId}/photo:
    post:
      consumes: [multipart/form-data]
      parameters:
        - { name: petId, in: path, required: true, type: integer }
        - { name: caption, in: formData, type: string, maxLength: 40 }
      responses:
        200: { description: ok }
definitions:
  Pet:
    type: object
    required: [name]
    properties:
      name: { type: string, minLength: 1 }
      age: { type: integer }
"##;
        let model = SpecExtractor::new().extract(doc).unwrap();
        let pets = model.get(&EndpointId::new("/pets", HttpMethod::Post)).unwrap();
        let limit = pets.parameter("limit").unwrap();
        assert_eq!(limit.param_type, ParamType::Integer);
        assert_eq!(limit.bounds.maximum, Some(50.0));
        let name = pets.parameter("name").unwrap();
        assert_eq!(name.location, ParamLocation::Body);
        assert!(name.required);
        assert!(!pets.parameter("age").unwrap().required);
        assert!(matches!(pets.responses[0].shape, Some(BodyShape::Object { .. })));

        let photo = model
            .get(&EndpointId::new("/pets/{petId}/photo", HttpMethod::Post))
            .unwrap();
        assert_eq!(photo.parameter("petId").unwrap().param_type, ParamType::Integer);
        let caption = photo.parameter("caption").unwrap();
        assert_eq!(caption.location, ParamLocation::Body);
        assert_eq!(caption.bounds.max_length, Some(40));
    }

    #[test]
    fn test_exclusive_bounds_3_1_numeric_form() {
        let b = bounds(&serde_json::json!({"exclusiveMinimum": 0, "exclusiveMaximum": 10}), true);
        assert_eq!(b.minimum, Some(1.0));
        assert_eq!(b.maximum, Some(9.0));

        let b = bounds(&serde_json::json!({"minimum": 0.5, "exclusiveMinimum": true}), false);
        assert_eq!(b.minimum, Some(0.5));
        assert!(b.exclusive_minimum);
    }
}
