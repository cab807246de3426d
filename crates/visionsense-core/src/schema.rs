/// Arrow schema and batch export for the prediction ledger.
pub mod ledger {
    use std::sync::Arc;

    use arrow::array::{
        Float32Array, Float32Builder, ListBuilder, StringArray, StringBuilder,
        TimestampNanosecondArray,
    };
    use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
    use arrow::error::ArrowError;
    use arrow::record_batch::RecordBatch;

    use crate::prediction::LedgerEntry;

    /// One row per ledger entry.
    pub fn ledger_schema() -> Schema {
        Schema::new(vec![
            Field::new(
                "timestamp",
                DataType::Timestamp(TimeUnit::Nanosecond, Some("UTC".into())),
                false,
            ),
            Field::new("filename", DataType::Utf8, true),
            Field::new("top_label", DataType::Utf8, false),
            Field::new("top_confidence", DataType::Float32, false),
            Field::new(
                "labels",
                DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))),
                false,
            ),
            Field::new(
                "confidences",
                DataType::List(Arc::new(Field::new("item", DataType::Float32, true))),
                false,
            ),
        ])
    }

    /// Build a batch from entries, keeping their order.
    pub fn ledger_to_record_batch(entries: &[LedgerEntry]) -> Result<RecordBatch, ArrowError> {
        let timestamps: Vec<i64> = entries
            .iter()
            .map(|e| e.timestamp.timestamp_nanos_opt().unwrap_or(i64::MAX))
            .collect();
        let filenames: StringArray = entries.iter().map(|e| e.filename.as_deref()).collect();
        let top_labels: StringArray = entries.iter().map(|e| Some(e.top.label.as_str())).collect();
        let top_confidences: Float32Array =
            entries.iter().map(|e| Some(e.top.confidence)).collect();

        let mut labels = ListBuilder::new(StringBuilder::new());
        let mut confidences = ListBuilder::new(Float32Builder::new());
        for entry in entries {
            for p in &entry.predictions {
                labels.values().append_value(&p.label);
                confidences.values().append_value(p.confidence);
            }
            labels.append(true);
            confidences.append(true);
        }

        RecordBatch::try_new(
            Arc::new(ledger_schema()),
            vec![
                Arc::new(TimestampNanosecondArray::from(timestamps).with_timezone("UTC")),
                Arc::new(filenames),
                Arc::new(top_labels),
                Arc::new(top_confidences),
                Arc::new(labels.finish()),
                Arc::new(confidences.finish()),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::ledger;
    use crate::prediction::{LedgerEntry, Prediction, PredictionResult};
    use arrow::array::{Array, ListArray, StringArray};

    fn entry(filename: Option<&str>) -> LedgerEntry {
        let result = PredictionResult::new(vec![
            Prediction {
                label: "cat".into(),
                confidence: 0.9,
            },
            Prediction {
                label: "dog".into(),
                confidence: 0.05,
            },
        ])
        .unwrap();
        LedgerEntry::new(filename.map(String::from), &result)
    }

    #[test]
    fn ledger_schema_has_expected_fields() {
        let schema = ledger::ledger_schema();
        assert_eq!(schema.fields().len(), 6);
        assert!(schema.field_with_name("top_label").is_ok());
        assert!(schema.field_with_name("filename").unwrap().is_nullable());
    }

    #[test]
    fn batch_from_entries() {
        let batch =
            ledger::ledger_to_record_batch(&[entry(Some("a.png")), entry(None)]).unwrap();
        assert_eq!(batch.num_rows(), 2);

        let filenames = batch
            .column_by_name("filename")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(filenames.value(0), "a.png");
        assert!(filenames.is_null(1));

        let labels = batch
            .column_by_name("labels")
            .unwrap()
            .as_any()
            .downcast_ref::<ListArray>()
            .unwrap();
        assert_eq!(labels.value(0).len(), 2);
    }

    #[test]
    fn empty_batch() {
        let batch = ledger::ledger_to_record_batch(&[]).unwrap();
        assert_eq!(batch.num_rows(), 0);
    }
}
