//! The pipeline under construction.

use crate::components::{Generator, Reader, Serializer, Transformer};
use crate::core::{Parameters, SaxEvent};
use crate::environment::Environment;
use crate::errors::{SitemapError, SitemapResult};
use crate::processor::TreeProcessor;
use std::fmt;
use std::sync::Arc;

/// One component placed on a pipeline.
pub struct PipelineStep<T: ?Sized> {
    /// Registered type name.
    pub type_name: String,
    /// The component.
    pub component: Arc<T>,
    /// Resolved source.
    pub source: Option<String>,
    /// Resolved parameters.
    pub parameters: Parameters,
    /// Content type overriding the component default.
    pub mime_type: Option<String>,
}

impl<T: ?Sized> PipelineStep<T> {
    /// Creates a step without source, parameters or content type.
    #[must_use]
    pub fn new(type_name: impl Into<String>, component: Arc<T>) -> Self {
        Self {
            type_name: type_name.into(),
            component,
            source: None,
            parameters: Parameters::new(),
            mime_type: None,
        }
    }

    /// Sets the source.
    #[must_use]
    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }

    /// Sets the parameters.
    #[must_use]
    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Sets the content type.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: Option<String>) -> Self {
        self.mime_type = mime_type;
        self
    }
}

impl<T: ?Sized> Clone for PipelineStep<T> {
    fn clone(&self) -> Self {
        Self {
            type_name: self.type_name.clone(),
            component: self.component.clone(),
            source: self.source.clone(),
            parameters: self.parameters.clone(),
            mime_type: self.mime_type.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for PipelineStep<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineStep")
            .field("type_name", &self.type_name)
            .field("source", &self.source)
            .field("parameters", &self.parameters)
            .field("mime_type", &self.mime_type)
            .finish_non_exhaustive()
    }
}

/// A generator, transformers and serializer, or a reader.
///
/// Setters reject combinations that cannot produce a response, so a
/// pipeline is never half-built in an inconsistent order.
///
/// A pipeline built without being executed remembers the processor that
/// assembled it and runs inside that processor's scope, so its sources
/// resolve the same way they would have during the request.
#[derive(Debug, Clone, Default)]
pub struct ProcessingPipeline {
    generator: Option<PipelineStep<dyn Generator>>,
    transformers: Vec<PipelineStep<dyn Transformer>>,
    serializer: Option<PipelineStep<dyn Serializer>>,
    reader: Option<PipelineStep<dyn Reader>>,
    status_code: Option<u16>,
    scope: Option<Arc<TreeProcessor>>,
}

impl ProcessingPipeline {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the generator.
    ///
    /// # Errors
    ///
    /// Returns a processing error if a generator or reader is already set.
    pub fn set_generator(&mut self, step: PipelineStep<dyn Generator>) -> SitemapResult<()> {
        if self.generator.is_some() {
            return Err(SitemapError::processing(format!(
                "Generator already set. Cannot set generator '{}'",
                step.type_name
            )));
        }
        if self.reader.is_some() {
            return Err(SitemapError::processing(format!(
                "Reader already set. Cannot set generator '{}'",
                step.type_name
            )));
        }
        self.generator = Some(step);
        Ok(())
    }

    /// Appends a transformer.
    ///
    /// # Errors
    ///
    /// Returns a processing error without a generator or after the serializer.
    pub fn add_transformer(&mut self, step: PipelineStep<dyn Transformer>) -> SitemapResult<()> {
        if self.generator.is_none() {
            return Err(SitemapError::processing(format!(
                "Must set a generator before adding transformer '{}'",
                step.type_name
            )));
        }
        if self.serializer.is_some() {
            return Err(SitemapError::processing(format!(
                "Serializer already set. Cannot add transformer '{}'",
                step.type_name
            )));
        }
        self.transformers.push(step);
        Ok(())
    }

    /// Sets the serializer.
    ///
    /// # Errors
    ///
    /// Returns a processing error without a generator, or if a serializer
    /// or reader is already set.
    pub fn set_serializer(&mut self, step: PipelineStep<dyn Serializer>) -> SitemapResult<()> {
        if self.serializer.is_some() || self.reader.is_some() {
            return Err(SitemapError::processing(format!(
                "Serializer or reader already set. Cannot set serializer '{}'",
                step.type_name
            )));
        }
        if self.generator.is_none() {
            return Err(SitemapError::processing(format!(
                "Must set a generator before setting serializer '{}'",
                step.type_name
            )));
        }
        self.serializer = Some(step);
        Ok(())
    }

    /// Sets the reader.
    ///
    /// # Errors
    ///
    /// Returns a processing error if a reader or generator is already set.
    pub fn set_reader(&mut self, step: PipelineStep<dyn Reader>) -> SitemapResult<()> {
        if self.reader.is_some() || self.generator.is_some() {
            return Err(SitemapError::processing(format!(
                "Pipeline already started. Cannot set reader '{}'",
                step.type_name
            )));
        }
        self.reader = Some(step);
        Ok(())
    }

    /// Sets the status code written before the body.
    pub fn set_status_code(&mut self, status_code: Option<u16>) {
        if status_code.is_some() {
            self.status_code = status_code;
        }
    }

    /// Returns the configured status code.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Returns the generator step.
    #[must_use]
    pub const fn generator(&self) -> Option<&PipelineStep<dyn Generator>> {
        self.generator.as_ref()
    }

    /// Returns the transformer steps in order.
    #[must_use]
    pub fn transformers(&self) -> &[PipelineStep<dyn Transformer>] {
        &self.transformers
    }

    /// Returns the serializer step.
    #[must_use]
    pub const fn serializer(&self) -> Option<&PipelineStep<dyn Serializer>> {
        self.serializer.as_ref()
    }

    /// Returns the reader step.
    #[must_use]
    pub const fn reader(&self) -> Option<&PipelineStep<dyn Reader>> {
        self.reader.as_ref()
    }

    /// Records the processor that assembled the pipeline. The first
    /// binding wins, so a pipeline built by a mounted sitemap keeps the
    /// mounted processor.
    pub fn bind_scope(&mut self, processor: &Arc<TreeProcessor>) {
        if self.scope.is_none() {
            self.scope = Some(processor.clone());
        }
    }

    /// Returns the processor the pipeline runs under, if bound.
    #[must_use]
    pub const fn scope(&self) -> Option<&Arc<TreeProcessor>> {
        self.scope.as_ref()
    }

    /// Returns true if nothing has been set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.generator.is_none() && self.reader.is_none()
    }

    /// Runs the generator and the transformers.
    ///
    /// # Errors
    ///
    /// Returns a processing error without a generator, and propagates
    /// component failures.
    pub async fn generate_events(&self, env: &Environment) -> SitemapResult<Vec<SaxEvent>> {
        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| SitemapError::processing("Pipeline has no generator"))?;
        let _scope = self.scope.as_ref().map(|processor| env.enter_scope(processor.clone()));
        let mut events = generator
            .component
            .generate(env, generator.source.as_deref(), &generator.parameters)
            .await?;
        for transformer in &self.transformers {
            events = transformer
                .component
                .transform(env, transformer.source.as_deref(), &transformer.parameters, events)
                .await?;
        }
        Ok(events)
    }

    /// Executes the pipeline and writes the response.
    ///
    /// # Errors
    ///
    /// Returns a processing error for a pipeline with neither a reader nor
    /// a serializer, and propagates component failures.
    pub async fn process(&self, env: &Environment) -> SitemapResult<bool> {
        let _scope = self.scope.as_ref().map(|processor| env.enter_scope(processor.clone()));
        let (body, content_type) = if let Some(reader) = &self.reader {
            let body = reader
                .component
                .read(env, reader.source.as_deref(), &reader.parameters)
                .await?;
            (body, reader.mime_type.clone().or_else(|| reader.component.mime_type()))
        } else if let Some(serializer) = &self.serializer {
            let events = self.generate_events(env).await?;
            let body = serializer
                .component
                .serialize(env, &serializer.parameters, &events)
                .await?;
            (
                body,
                serializer.mime_type.clone().or_else(|| serializer.component.mime_type()),
            )
        } else {
            return Err(SitemapError::processing(
                "Pipeline has neither a reader nor a serializer",
            ));
        };
        let mut response = env.response();
        if let Some(status) = self.status_code {
            response.status = Some(status);
        }
        if content_type.is_some() {
            response.content_type = content_type;
        }
        response.body = body;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{NotifyingGenerator, XmlSerializer};
    use crate::testing::{StaticGenerator, StaticReader};
    use pretty_assertions::assert_eq;

    fn generator() -> PipelineStep<dyn Generator> {
        PipelineStep::new(
            "static",
            Arc::new(StaticGenerator::new(SaxEvent::text_document("page", "hello"))) as Arc<dyn Generator>,
        )
    }

    #[test]
    fn test_setters_enforce_order() {
        let mut pipeline = ProcessingPipeline::new();
        let serializer: PipelineStep<dyn Serializer> =
            PipelineStep::new("xml", Arc::new(XmlSerializer::default()) as Arc<dyn Serializer>);
        assert!(pipeline.set_serializer(serializer.clone()).is_err());

        pipeline.set_generator(generator()).unwrap();
        assert!(pipeline.set_generator(generator()).is_err());
        pipeline.set_serializer(serializer.clone()).unwrap();
        assert!(pipeline.set_serializer(serializer).is_err());

        let reader: PipelineStep<dyn Reader> =
            PipelineStep::new("static", Arc::new(StaticReader::new("x")) as Arc<dyn Reader>);
        assert!(pipeline.set_reader(reader).is_err());
    }

    #[tokio::test]
    async fn test_process_serializer_pipeline() {
        let env = Environment::new("page");
        let mut pipeline = ProcessingPipeline::new();
        pipeline.set_generator(generator()).unwrap();
        pipeline
            .set_serializer(
                PipelineStep::new("xml", Arc::new(XmlSerializer::default()) as Arc<dyn Serializer>)
                    .with_parameters(Parameters::new().with("omit-xml-declaration", "true")),
            )
            .unwrap();
        pipeline.set_status_code(Some(201));

        assert!(pipeline.process(&env).await.unwrap());
        let response = env.response_snapshot();
        assert_eq!(response.body_text(), "<page>hello</page>");
        assert_eq!(response.status, Some(201));
        assert_eq!(response.content_type.as_deref(), Some("text/xml"));
    }

    #[tokio::test]
    async fn test_process_reader_pipeline_uses_mime_override() {
        let env = Environment::new("logo");
        let mut pipeline = ProcessingPipeline::new();
        pipeline
            .set_reader(
                PipelineStep::new("static", Arc::new(StaticReader::new("PNG")) as Arc<dyn Reader>)
                    .with_mime_type(Some("image/png".to_string())),
            )
            .unwrap();

        pipeline.process(&env).await.unwrap();
        let response = env.response_snapshot();
        assert_eq!(response.body, b"PNG".to_vec());
        assert_eq!(response.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_incomplete_pipeline_fails() {
        let env = Environment::new("page");
        let mut pipeline = ProcessingPipeline::new();
        pipeline
            .set_generator(PipelineStep::new(
                "notifying",
                Arc::new(NotifyingGenerator) as Arc<dyn Generator>,
            ))
            .unwrap();
        assert!(pipeline.process(&env).await.is_err());
    }
}
